//! sfexport-file - Filesystem storage for the attachment exporter.
//!
//! Three stores, all rooted in caller-supplied paths:
//!
//! - [`FileLayout`]: one body file per record, written through a temporary
//!   sibling and renamed into place once its size checks out.
//! - [`CheckpointStore`]: the resumable cursor, replaced atomically.
//! - [`LedgerWriter`]: the append-only CSV of downloaded records.

mod checkpoint;
mod layout;
mod ledger;

pub use checkpoint::CheckpointStore;
pub use layout::FileLayout;
pub use ledger::LedgerWriter;

use std::path::Path;

use sfexport_core::error::{Error, StorageError};

/// Wrap an I/O error with the operation and path it came from.
pub(crate) fn map_io(op: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Error {
    let path = path.to_path_buf();
    move |err| StorageError::io(op, path, err).into()
}
