//! Record query and body transfer traits.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;

use crate::Result;
use crate::query::PageRequest;
use crate::session::Credential;
use crate::types::Record;

/// A streamed record body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// The query endpoint.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Run one filtered, ordered, size-limited query.
    ///
    /// Implementations must honor every part of the request: only records
    /// with a non-empty body, only records strictly after `request.after`,
    /// in [`total_order`](crate::types::total_order), at most `request.limit`.
    async fn query_page(&self, credential: &Credential, request: &PageRequest)
    -> Result<Vec<Record>>;
}

/// The binary fetch endpoint.
#[async_trait]
pub trait BodySource: Send + Sync {
    /// Open a streamed fetch of one record's body.
    async fn open_body(&self, credential: &Credential, record: &Record) -> Result<ByteStream>;
}
