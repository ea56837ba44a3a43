//! Status command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use sfexport::CheckpointStore;

use crate::output;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Checkpoint file
    #[arg(long, default_value = "last_marker.json")]
    pub checkpoint: PathBuf,

    /// Print the checkpoint as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: StatusArgs) -> Result<()> {
    let store = CheckpointStore::new(&args.checkpoint);
    let cursor = store.load().context("Failed to read checkpoint")?;

    match (cursor, args.json) {
        (cursor, true) => output::json_pretty(&cursor)?,
        (Some(cursor), false) => {
            output::field("Checkpoint", store.path().display());
            output::field("Last timestamp", &cursor.last_timestamp);
            output::field("Last id", &cursor.last_id);
        }
        (None, false) => {
            output::field("Checkpoint", store.path().display());
            println!("No checkpoint yet; the next run starts from the newest record.");
        }
    }

    Ok(())
}
