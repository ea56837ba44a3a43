//! sfexport - Resumable bulk export of CRM attachments.
//!
//! The [`Exporter`] walks the record set page by page, hands each page's
//! records to the [`DownloadEngine`] on a bounded pool of tasks, and moves
//! the checkpoint forward only after every record of the page has a
//! terminal [`DownloadOutcome`]. A stopped run resumes at the first page it
//! had not finished.
//!
//! Transport is pluggable through the traits re-exported from
//! `sfexport-core`; the `sfexport-rest` crate provides the HTTP version.

mod config;
mod engine;
mod exporter;

pub use config::ExportConfig;
pub use engine::{DownloadEngine, DownloadOutcome};
pub use exporter::{ExportError, Exporter, RunSummary};

pub use sfexport_core::{
    BodySource, Credentials, Error, IdentityProvider, MetadataLedger, RecordSource, Result,
    RetryPolicy, Session,
};
pub use sfexport_file::{CheckpointStore, FileLayout, LedgerWriter};
