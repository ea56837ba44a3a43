//! Append-only metadata ledger.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::spawn_blocking;
use tracing::{debug, instrument};

use sfexport_core::error::{Error, StorageError};
use sfexport_core::schema::ATTACHMENT_FIELDS;
use sfexport_core::{MetadataLedger, Record, Result};

use crate::map_io;

/// CSV ledger with one row per downloaded record.
///
/// Rows are appended after whatever the file already holds. The header is
/// written only when the file is new or empty. Concurrent callers are
/// serialized, so every row lands whole. Writes and syncs run on the
/// blocking pool.
pub struct LedgerWriter {
    path: PathBuf,
    columns: Vec<String>,
    writer: Arc<Mutex<csv::Writer<File>>>,
}

impl LedgerWriter {
    /// Open the ledger with the attachment column set.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_columns(path, ATTACHMENT_FIELDS.iter().map(|c| c.to_string()))
    }

    /// Open the ledger with an explicit, ordered column set.
    #[instrument(skip(path, columns), fields(path = %path.as_ref().display()))]
    pub fn with_columns(
        path: impl AsRef<Path>,
        columns: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let columns: Vec<String> = columns.into_iter().collect();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(map_io("create directory", parent))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(map_io("open", &path))?;
        let is_empty = file.metadata().map_err(map_io("stat", &path))?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_empty {
            writer.write_record(&columns).map_err(encode)?;
            writer.flush().map_err(map_io("write", &path))?;
            debug!(columns = columns.len(), "Created ledger");
        }

        Ok(Self {
            path,
            columns,
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    /// Append one row for `record`.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub async fn append(&self, record: &Record) -> Result<()> {
        let row: Vec<String> = self
            .columns
            .iter()
            .map(|column| record.field_text(column))
            .collect();

        let writer = Arc::clone(&self.writer);
        let path = self.path.clone();
        spawn_blocking(move || {
            let mut writer = writer
                .lock()
                .map_err(|_| StorageError::io("lock", &path, io::Error::other("poisoned")))?;
            writer.write_record(&row).map_err(encode)?;
            writer.flush().map_err(map_io("write", &path))?;
            writer.get_ref().sync_data().map_err(map_io("sync", &path))
        })
        .await
        .map_err(|e| StorageError::io("append", &self.path, io::Error::other(e)))?
    }
}

#[async_trait]
impl MetadataLedger for LedgerWriter {
    async fn append(&self, record: &Record) -> Result<()> {
        LedgerWriter::append(self, record).await
    }
}

impl std::fmt::Debug for LedgerWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerWriter")
            .field("path", &self.path)
            .field("columns", &self.columns.len())
            .finish()
    }
}

fn encode(err: csv::Error) -> Error {
    Error::Storage(StorageError::Encode {
        message: err.to_string(),
    })
}
