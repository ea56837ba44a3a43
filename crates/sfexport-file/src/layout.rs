//! Local body files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use sfexport_core::error::IntegrityError;
use sfexport_core::{ByteStream, Record, Result};

use crate::map_io;

/// Suffix of in-progress body files.
const PARTIAL_SUFFIX: &str = ".part";

/// Where record bodies live on disk.
///
/// Each record owns exactly one target path, `<output_dir>/<id><ext>`, and
/// one temporary sibling. Different records never share a path, so workers
/// need no coordination here.
#[derive(Debug, Clone)]
pub struct FileLayout {
    root: PathBuf,
}

impl FileLayout {
    /// Create a layout rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Returns the output directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the output directory if needed.
    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(map_io("create directory", &self.root))
    }

    /// Final location of a record's body.
    pub fn target_path(&self, record: &Record) -> PathBuf {
        self.root.join(record.file_name())
    }

    /// Temporary location used while a body is in flight.
    pub fn partial_path(&self, record: &Record) -> PathBuf {
        self.root
            .join(format!("{}{}", record.file_name(), PARTIAL_SUFFIX))
    }

    /// Size of an existing body file, if there is one.
    pub async fn existing_len(&self, record: &Record) -> Result<Option<u64>> {
        let path = self.target_path(record);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(map_io("stat", &path)(err)),
        }
    }

    /// Delete a body file whose size does not match the record.
    pub async fn discard(&self, record: &Record) -> Result<()> {
        let path = self.target_path(record);
        remove_if_exists(&path).await
    }

    /// Write a streamed body and move it into place.
    ///
    /// The body goes to the partial file first, is synced, and is renamed
    /// onto the target only if its length equals the record's declared
    /// size. On any failure the partial file is removed and the target is
    /// left untouched.
    ///
    /// Returns the number of bytes written.
    #[instrument(skip(self, record, body), fields(id = %record.id))]
    pub async fn store_body(&self, record: &Record, body: ByteStream) -> Result<u64> {
        let partial = self.partial_path(record);

        let written = match write_stream(&partial, body).await {
            Ok(written) => written,
            Err(err) => {
                cleanup(&partial).await;
                return Err(err);
            }
        };

        if written != record.body_length {
            cleanup(&partial).await;
            return Err(IntegrityError::SizeMismatch {
                expected: record.body_length,
                actual: written,
            }
            .into());
        }

        let target = self.target_path(record);
        if let Err(err) = fs::rename(&partial, &target).await {
            cleanup(&partial).await;
            return Err(map_io("rename", &partial)(err));
        }

        debug!(bytes = written, path = %target.display(), "Stored body");
        Ok(written)
    }
}

async fn write_stream(path: &Path, mut body: ByteStream) -> Result<u64> {
    let mut file = fs::File::create(path)
        .await
        .map_err(map_io("create", path))?;

    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(map_io("write", path))?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(map_io("flush", path))?;
    file.sync_all().await.map_err(map_io("sync", path))?;
    Ok(written)
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(map_io("remove", path)(err)),
    }
}

async fn cleanup(path: &Path) {
    if let Err(err) = remove_if_exists(path).await {
        warn!(error = %err, "Failed to remove partial file");
    }
}
