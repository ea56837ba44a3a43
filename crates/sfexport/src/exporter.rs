//! The page, download, checkpoint loop.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet, spawn_blocking};
use tracing::{error, info, instrument, warn};

use sfexport_core::error::StorageError;
use sfexport_core::{
    BodySource, Cursor, Error, IdentityProvider, MetadataLedger, Page, PagedQuery, RecordId,
    RecordSource, Session,
};
use sfexport_file::{CheckpointStore, FileLayout, LedgerWriter};

use crate::config::ExportConfig;
use crate::engine::{DownloadEngine, DownloadOutcome};

/// Failures that end a run.
///
/// Per-record failures never show up here; they are counted in the
/// [`RunSummary`].
#[derive(Debug, Error)]
pub enum ExportError {
    /// The configuration or local storage could not be prepared.
    #[error("setup failed: {0}")]
    Setup(#[source] Error),

    /// The identity endpoint rejected us and the run cannot continue.
    #[error("authentication failed: {0}")]
    Auth(#[source] Error),

    /// A page could not be fetched.
    #[error("page fetch failed after {pages} page(s): {source}")]
    Fetch {
        pages: u64,
        #[source]
        source: Error,
    },

    /// The checkpoint could not be read or written.
    #[error("checkpoint failed: {0}")]
    Checkpoint(#[source] Error),
}

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages fully processed and checkpointed.
    pub pages: u64,
    /// Records written in this run.
    pub downloaded: u64,
    /// Records already complete on disk.
    pub skipped: u64,
    /// Records that ended in failure.
    pub failed: u64,
    /// Body bytes written in this run.
    pub bytes: u64,
    /// Identifiers of the failed records, in completion order.
    pub failed_ids: Vec<RecordId>,
    /// Last saved cursor, if any.
    pub checkpoint: Option<Cursor>,
    /// Whether the run stopped at the page limit rather than the end.
    pub stopped_at_limit: bool,
}

impl RunSummary {
    fn record(&mut self, id: RecordId, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Skipped => self.skipped += 1,
            DownloadOutcome::Downloaded { bytes } => {
                self.downloaded += 1;
                self.bytes += bytes;
            }
            DownloadOutcome::Failed { .. } => {
                self.failed += 1;
                self.failed_ids.push(id);
            }
        }
    }
}

/// Drives a resumable export.
///
/// Pages are fetched strictly one after another. Within a page, records
/// are downloaded on a fresh task group bounded by a semaphore, and the
/// checkpoint moves to the page's last record only once every task has
/// reported back.
pub struct Exporter<S, B, P> {
    query: PagedQuery<S, P>,
    engine: Arc<DownloadEngine<B, P>>,
    checkpoints: CheckpointStore,
    concurrency: usize,
    max_pages: Option<u64>,
}

impl<S, B, P> Exporter<S, B, P>
where
    S: RecordSource + 'static,
    B: BodySource + 'static,
    P: IdentityProvider + 'static,
{
    /// Validate `config`, prepare local storage and build an exporter.
    ///
    /// Creates the output directory and opens the CSV ledger at
    /// `config.ledger_path`.
    pub async fn new(
        config: ExportConfig,
        records: Arc<S>,
        bodies: Arc<B>,
        session: Session<P>,
    ) -> Result<Self, ExportError> {
        config.validate().map_err(ExportError::Setup)?;
        let ledger = LedgerWriter::open(&config.ledger_path).map_err(ExportError::Setup)?;
        Self::with_ledger(config, records, bodies, session, Arc::new(ledger)).await
    }

    /// Like [`new`](Self::new), but completed downloads go to `ledger`.
    /// `config.ledger_path` is ignored.
    pub async fn with_ledger(
        config: ExportConfig,
        records: Arc<S>,
        bodies: Arc<B>,
        session: Session<P>,
        ledger: Arc<dyn MetadataLedger>,
    ) -> Result<Self, ExportError> {
        config.validate().map_err(ExportError::Setup)?;

        let layout = FileLayout::new(&config.output_dir);
        layout.ensure_root().await.map_err(ExportError::Setup)?;

        let engine = DownloadEngine::new(bodies, session.clone(), layout, ledger, config.retry);

        Ok(Self {
            query: PagedQuery::new(records, session, config.batch_size),
            engine: Arc::new(engine),
            checkpoints: CheckpointStore::new(&config.checkpoint_path),
            concurrency: config.concurrency,
            max_pages: config.max_pages,
        })
    }

    /// Run until the record set is exhausted or the page limit is hit.
    ///
    /// # Errors
    ///
    /// Stops at the first page or checkpoint failure. Pages already
    /// processed stay checkpointed, so the next run picks up after them.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<RunSummary, ExportError> {
        let mut cursor = self.checkpoints.load().map_err(ExportError::Checkpoint)?;
        let mut summary = RunSummary {
            checkpoint: cursor.clone(),
            ..RunSummary::default()
        };

        match &cursor {
            Some(c) => info!(cursor = %c, "Resuming from checkpoint"),
            None => info!("Starting from the beginning"),
        }

        loop {
            if self.max_pages.is_some_and(|max| summary.pages >= max) {
                info!(pages = summary.pages, "Page limit reached");
                summary.stopped_at_limit = true;
                break;
            }

            let page = match self.query.next_page(cursor.as_ref()).await {
                Ok(page) => page,
                Err(err) => {
                    error!(error = %err, pages = summary.pages, "Page fetch failed, stopping");
                    return Err(if matches!(err, Error::Auth(_)) {
                        ExportError::Auth(err)
                    } else {
                        ExportError::Fetch {
                            pages: summary.pages,
                            source: err,
                        }
                    });
                }
            };

            if !page.has_more {
                info!("No more records");
                break;
            }

            let Some(next) = page.next_cursor.clone() else {
                break;
            };

            self.process_page(page, &mut summary).await;

            self.save_checkpoint(&next).await?;
            summary.pages += 1;
            info!(
                page = summary.pages,
                cursor = %next,
                downloaded = summary.downloaded,
                skipped = summary.skipped,
                failed = summary.failed,
                "Page complete"
            );

            summary.checkpoint = Some(next.clone());
            cursor = Some(next);
        }

        Ok(summary)
    }

    /// Persist `cursor` on the blocking pool.
    async fn save_checkpoint(&self, cursor: &Cursor) -> Result<(), ExportError> {
        let store = self.checkpoints.clone();
        let cursor = cursor.clone();
        spawn_blocking(move || store.save(&cursor))
            .await
            .map_err(|e| {
                let err = StorageError::io("save", self.checkpoints.path(), io::Error::other(e));
                ExportError::Checkpoint(err.into())
            })?
            .map_err(ExportError::Checkpoint)
    }

    /// Download every record of `page` and wait for all of them.
    ///
    /// Every record ends up in `summary`, including one whose task panicked.
    async fn process_page(&self, page: Page, summary: &mut RunSummary) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<task::Id, RecordId> = HashMap::new();

        for record in page.records {
            let id = record.id.clone();
            let engine = Arc::clone(&self.engine);
            let semaphore = Arc::clone(&semaphore);
            let handle = tasks.spawn(async move {
                match semaphore.acquire_owned().await {
                    Ok(_permit) => engine.fetch(&record).await,
                    Err(_) => DownloadOutcome::Failed {
                        attempts: 0,
                        reason: "worker pool closed".to_string(),
                    },
                }
            });
            in_flight.insert(handle.id(), id);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (task, outcome) = match joined {
                Ok((task, outcome)) => (task, outcome),
                Err(err) => {
                    let reason = if err.is_panic() {
                        "download task panicked"
                    } else {
                        "download task was cancelled"
                    };
                    warn!(error = %err, "{}", reason);
                    let outcome = DownloadOutcome::Failed {
                        attempts: 0,
                        reason: reason.to_string(),
                    };
                    (err.id(), outcome)
                }
            };

            match in_flight.remove(&task) {
                Some(id) => summary.record(id, &outcome),
                None => error!(?task, "Finished task has no record"),
            }
        }
    }
}
