//! Terminal output helpers.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use sfexport::RunSummary;

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a notice that needs the operator's attention.
pub fn notice(msg: &str) {
    println!("{} {}", "!".yellow(), msg);
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print a value as pretty-printed JSON.
pub fn json_pretty<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the end-of-run report.
pub fn summary(summary: &RunSummary) {
    println!();
    field("Pages", summary.pages);
    field("Downloaded", summary.downloaded);
    field("Skipped", summary.skipped);
    field("Failed", summary.failed);
    field("Bytes written", summary.bytes);
    match &summary.checkpoint {
        Some(cursor) => field("Checkpoint", cursor),
        None => field("Checkpoint", "none"),
    }

    for id in &summary.failed_ids {
        error(&format!("Failed: {}", id));
    }
    if summary.failed > 0 {
        notice("Failed records are behind the checkpoint; delete it to rescan them");
    }

    if summary.stopped_at_limit {
        notice("Stopped at the page limit; run again to continue");
    } else {
        success("Export complete");
    }
}
