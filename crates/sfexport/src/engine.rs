//! Per-record download with retry and integrity check.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use sfexport_core::{
    BodySource, IdentityProvider, MetadataLedger, Record, Result, RetryFailure, RetryPolicy,
    Session, attempt_with_policy,
};
use sfexport_file::FileLayout;

/// Terminal result of one record's download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A complete file was already on disk.
    Skipped,
    /// The body was written and moved into place.
    Downloaded { bytes: u64 },
    /// Every attempt failed, or the failure was not worth retrying.
    Failed { attempts: u32, reason: String },
}

impl DownloadOutcome {
    fn failed(failure: RetryFailure) -> Self {
        Self::Failed {
            attempts: failure.attempts,
            reason: failure.error.to_string(),
        }
    }
}

/// Downloads record bodies into a [`FileLayout`] and records them in the
/// ledger.
///
/// The engine is shared by all workers of a page. Record files never
/// overlap, the ledger serializes its own writers, and credential refresh
/// goes through the shared [`Session`].
pub struct DownloadEngine<B, P> {
    bodies: Arc<B>,
    session: Session<P>,
    layout: FileLayout,
    ledger: Arc<dyn MetadataLedger>,
    policy: RetryPolicy,
}

impl<B, P> DownloadEngine<B, P>
where
    B: BodySource,
    P: IdentityProvider,
{
    /// Create an engine.
    pub fn new(
        bodies: Arc<B>,
        session: Session<P>,
        layout: FileLayout,
        ledger: Arc<dyn MetadataLedger>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            bodies,
            session,
            layout,
            ledger,
            policy,
        }
    }

    /// Bring one record's body to disk.
    ///
    /// Never returns an error: every failure ends in
    /// [`DownloadOutcome::Failed`].
    #[instrument(skip(self, record), fields(id = %record.id, size = record.body_length))]
    pub async fn fetch(&self, record: &Record) -> DownloadOutcome {
        match self.layout.existing_len(record).await {
            Ok(Some(len)) if len == record.body_length => {
                info!("Already downloaded, skipping");
                return DownloadOutcome::Skipped;
            }
            Ok(Some(len)) => {
                warn!(on_disk = len, "Existing file has the wrong size, downloading again");
                if let Err(err) = self.layout.discard(record).await {
                    error!(error = %err, "Cannot remove stale file");
                    return DownloadOutcome::Failed {
                        attempts: 0,
                        reason: err.to_string(),
                    };
                }
            }
            Ok(None) => {}
            Err(err) => {
                error!(error = %err, "Cannot inspect target file");
                return DownloadOutcome::Failed {
                    attempts: 0,
                    reason: err.to_string(),
                };
            }
        }

        let bytes = match attempt_with_policy(&self.policy, |_| self.attempt(record)).await {
            Ok(bytes) => bytes,
            Err(failure) => {
                error!(error = %failure.error, attempts = failure.attempts, "Download failed");
                return DownloadOutcome::failed(failure);
            }
        };

        if let Err(err) = self.ledger.append(record).await {
            // The body is complete; only the metadata row is missing.
            error!(error = %err, "Failed to append ledger row");
        }

        info!(bytes, "Downloaded");
        DownloadOutcome::Downloaded { bytes }
    }

    /// One transfer attempt with the current credential.
    ///
    /// An expired credential is replaced before the error is handed back,
    /// so the next attempt runs with the fresh one.
    async fn attempt(&self, record: &Record) -> Result<u64> {
        let credential = self.session.current().await;

        let result = match self.bodies.open_body(&credential, record).await {
            Ok(body) => self.layout.store_body(record, body).await,
            Err(err) => Err(err),
        };

        match result {
            Err(err) if err.is_session_expired() => {
                self.session.refresh(credential.generation()).await?;
                Err(err)
            }
            other => other,
        }
    }
}
