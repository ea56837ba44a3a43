//! Persisted scan position.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use sfexport_core::error::{Error, StorageError};
use sfexport_core::{Cursor, Result};

use crate::map_io;

/// Durable storage for the last fully processed [`Cursor`].
///
/// A save replaces the file as a whole: the new content is written to a
/// sibling, synced and renamed over the target, so a crash leaves either
/// the old or the new cursor on disk.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store backed by the file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the checkpoint file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the saved cursor.
    ///
    /// Returns `None` when no checkpoint has been written yet.
    ///
    /// # Errors
    ///
    /// A file that exists but does not hold a cursor is reported as
    /// [`StorageError::Corrupt`] rather than treated as a fresh start.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Option<Cursor>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No checkpoint found");
                return Ok(None);
            }
            Err(err) => return Err(map_io("read", &self.path)(err)),
        };

        let cursor: Cursor = serde_json::from_str(&content).map_err(|e| {
            Error::Storage(StorageError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })
        })?;

        debug!(cursor = %cursor, "Loaded checkpoint");
        Ok(Some(cursor))
    }

    /// Replace the saved cursor.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn save(&self, cursor: &Cursor) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(map_io("create directory", parent))?;
        }

        let content = serde_json::to_string_pretty(cursor).map_err(|e| {
            Error::Storage(StorageError::Encode {
                message: e.to_string(),
            })
        })?;

        let temp = self.temp_path();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp)
            .map_err(map_io("create", &temp))?;
        file.write_all(content.as_bytes())
            .map_err(map_io("write", &temp))?;
        file.sync_all().map_err(map_io("sync", &temp))?;
        drop(file);

        fs::rename(&temp, &self.path).map_err(map_io("rename", &temp))?;
        sync_parent(&self.path);

        debug!(cursor = %cursor, "Saved checkpoint");
        Ok(())
    }
}

/// Make the rename durable. Platforms that cannot open a directory skip it.
fn sync_parent(path: &Path) {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return;
    };
    if let Ok(dir) = fs::File::open(parent) {
        let _ = dir.sync_all();
    }
}
