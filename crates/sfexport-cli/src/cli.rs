//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{run::RunArgs, status::StatusArgs};

/// Resumable bulk exporter for CRM attachments.
#[derive(Parser, Debug)]
#[command(name = "sfexport")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Also append warnings and errors to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download every attachment not yet on disk, resuming from the checkpoint
    Run(RunArgs),

    /// Show the saved checkpoint
    Status(StatusArgs),
}
