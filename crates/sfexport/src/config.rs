//! Export configuration.

use std::path::PathBuf;

use sfexport_core::error::{Error, InvalidInputError};
use sfexport_core::query::MAX_BATCH_SIZE;
use sfexport_core::{Result, RetryPolicy};

/// Everything a run needs besides the endpoints themselves.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory receiving one file per record.
    pub output_dir: PathBuf,
    /// Checkpoint file.
    pub checkpoint_path: PathBuf,
    /// Ledger CSV file.
    pub ledger_path: PathBuf,
    /// Downloads in flight at once within a page.
    pub concurrency: usize,
    /// Records per page.
    pub batch_size: u32,
    /// Stop after this many pages; the next run resumes from the checkpoint.
    pub max_pages: Option<u64>,
    /// Per-record transfer retries.
    pub retry: RetryPolicy,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("attachments"),
            checkpoint_path: PathBuf::from("last_marker.json"),
            ledger_path: PathBuf::from("attachments_metadata.csv"),
            concurrency: 10,
            batch_size: 200,
            max_pages: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ExportConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInputError::Config`] naming the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(invalid("concurrency must be at least 1"));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(invalid(format!(
                "batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }
        if self.max_pages == Some(0) {
            return Err(invalid("max pages must be at least 1 when set"));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(invalid("retry base delay exceeds the maximum delay"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidInput(InvalidInputError::Config {
        message: message.into(),
    })
}
