//! sfexport - Resumable bulk exporter for CRM attachments.
//!
//! A thin wrapper over the `sfexport` library: it logs in through the SOAP
//! endpoint, exports through the REST API, and reports what happened.

mod cli;
mod commands;
mod output;

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use cli::{Cli, Commands};
use commands::{run, status};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs, cli.log_file.as_deref())?;

    let result = match cli.command {
        Commands::Run(args) => run::run(args).await,
        Commands::Status(args) => status::run(args).await,
    };

    if let Err(err) = &result {
        tracing::error!(error = %format!("{:#}", err), "Command failed");
    }
    result
}

fn init_logging(verbosity: u8, json: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Problems always reach the log file, whatever the console shows.
    let file_layer = match log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?))
                .with_filter(LevelFilter::WARN),
        ),
        None => None,
    };

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_filter(filter).boxed())
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_filter(filter).boxed())
            .with(file_layer)
            .init();
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
