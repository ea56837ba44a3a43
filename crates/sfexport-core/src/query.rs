//! Resumable paging over the record set.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::Result;
use crate::session::Session;
use crate::traits::{IdentityProvider, RecordSource};
use crate::types::{Cursor, Page};

/// Largest page the query endpoint will return in one response.
pub const MAX_BATCH_SIZE: u32 = 2000;

/// One page query: records strictly after `after`, at most `limit` of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub after: Option<Cursor>,
    pub limit: u32,
}

/// Walks the record set one page at a time in total order.
///
/// Every call is independent: the caller owns the cursor and passes it back
/// in. Pages are fetched with the session's current credential; one expiry
/// is absorbed by refreshing and repeating the query.
pub struct PagedQuery<S, P> {
    source: Arc<S>,
    session: Session<P>,
    batch_size: u32,
}

impl<S, P> PagedQuery<S, P>
where
    S: RecordSource,
    P: IdentityProvider,
{
    /// Create a query over `source` returning at most `batch_size` records
    /// per page.
    pub fn new(source: Arc<S>, session: Session<P>, batch_size: u32) -> Self {
        Self {
            source,
            session,
            batch_size,
        }
    }

    /// Fetch the page following `cursor` (or the first page when `None`).
    ///
    /// # Errors
    ///
    /// Returns the query error. An expired session is refreshed and the
    /// query repeated once; a second failure of any kind is returned.
    #[instrument(skip(self), fields(batch_size = self.batch_size))]
    pub async fn next_page(&self, cursor: Option<&Cursor>) -> Result<Page> {
        let request = PageRequest {
            after: cursor.cloned(),
            limit: self.batch_size,
        };

        let credential = self.session.current().await;
        let records = match self.source.query_page(&credential, &request).await {
            Ok(records) => records,
            Err(err) if err.is_session_expired() => {
                warn!("Session expired during page query, refreshing");
                let fresh = self.session.refresh(credential.generation()).await?;
                self.source.query_page(&fresh, &request).await?
            }
            Err(err) => return Err(err),
        };

        if let Some(cursor) = cursor {
            let behind = records.iter().filter(|r| !cursor.precedes(r)).count();
            if behind > 0 {
                warn!(behind, "Query returned records at or before the cursor");
            }
        }

        let page = Page::new(records);
        match &page.next_cursor {
            Some(next) => info!(records = page.len(), next = %next, "Fetched page"),
            None => debug!("Fetched empty page"),
        }
        Ok(page)
    }
}
