//! Metadata ledger trait.

use async_trait::async_trait;

use crate::Result;
use crate::types::Record;

/// Durable record of completed downloads.
#[async_trait]
pub trait MetadataLedger: Send + Sync {
    /// Record that `record`'s body is complete on disk.
    ///
    /// Concurrent calls must not interleave their rows.
    async fn append(&self, record: &Record) -> Result<()>;
}
