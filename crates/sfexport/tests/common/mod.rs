//! In-memory identity, query and body endpoints for end-to-end tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use serde_json::{Map, Value, json};

use sfexport::{ExportConfig, Exporter, MetadataLedger, RetryPolicy, Session};
use sfexport_core::error::{Error, ProtocolError, StorageError, TransportError};
use sfexport_core::types::total_order;
use sfexport_core::{
    AccessToken, BodySource, ByteStream, Credential, IdentityProvider, InstanceUrl, PageRequest,
    Record, RecordSource, Result, SessionGrant,
};

pub struct FakeIdentity {
    pub logins: AtomicUsize,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self {
            logins: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn login(&self) -> Result<SessionGrant> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(SessionGrant {
            access_token: AccessToken::new(format!("token-{n}")),
            instance_url: InstanceUrl::new("https://acme.my.salesforce.com").unwrap(),
        })
    }
}

/// How the body endpoint treats one record.
#[derive(Clone, Debug)]
pub enum BodyBehavior {
    /// Serve the full body.
    Full,
    /// Serve only half the body for the first `n` requests.
    TruncatedFor(usize),
    /// Always serve half the body.
    AlwaysTruncated,
    /// Answer 404.
    NotFound,
    /// Reject the initial credential as expired.
    ExpireFirstToken,
    /// Panic inside the transfer.
    Panic,
    /// Answer the first request with a rate limit asking for this wait.
    RateLimitedOnce(Duration),
}

/// A ledger whose every append fails.
pub struct BrokenLedger {
    pub appends: AtomicUsize,
}

impl BrokenLedger {
    pub fn new() -> Self {
        Self {
            appends: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MetadataLedger for BrokenLedger {
    async fn append(&self, _record: &Record) -> Result<()> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        Err(Error::Storage(StorageError::io(
            "write",
            "attachments_metadata.csv",
            std::io::Error::other("no space left on device"),
        )))
    }
}

pub struct FakeStore {
    records: Mutex<Vec<Record>>,
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    behaviors: Mutex<HashMap<String, BodyBehavior>>,
    body_requests: Mutex<HashMap<String, usize>>,
    query_failures: Mutex<VecDeque<Option<Error>>>,
    pub queries: Mutex<Vec<PageRequest>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            bodies: Mutex::new(HashMap::new()),
            behaviors: Mutex::new(HashMap::new()),
            body_requests: Mutex::new(HashMap::new()),
            query_failures: Mutex::new(VecDeque::new()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Add a record whose body is `len` copies of its id's first byte.
    pub fn add(&self, id: &str, created: &str, len: usize, name: &str) -> Record {
        let record = record(id, created, len as u64, name);
        let fill = id.as_bytes()[0];
        self.bodies
            .lock()
            .unwrap()
            .insert(id.to_string(), vec![fill; len]);
        self.records.lock().unwrap().push(record.clone());
        record
    }

    pub fn set_behavior(&self, id: &str, behavior: BodyBehavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(id.to_string(), behavior);
    }

    /// Script the outcome of upcoming queries: `None` succeeds, `Some` fails.
    pub fn script_queries(&self, script: Vec<Option<Error>>) {
        self.query_failures.lock().unwrap().extend(script);
    }

    pub fn body_requests(&self, id: &str) -> usize {
        self.body_requests
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub fn body(&self, id: &str) -> Vec<u8> {
        self.bodies.lock().unwrap()[id].clone()
    }
}

#[async_trait]
impl RecordSource for FakeStore {
    async fn query_page(
        &self,
        _credential: &Credential,
        request: &PageRequest,
    ) -> Result<Vec<Record>> {
        self.queries.lock().unwrap().push(request.clone());
        if let Some(Some(err)) = self.query_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut matching: Vec<Record> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.body_length > 0)
            .filter(|r| request.after.as_ref().is_none_or(|c| c.precedes(r)))
            .cloned()
            .collect();
        matching.sort_by(total_order);
        matching.truncate(request.limit as usize);
        Ok(matching)
    }
}

#[async_trait]
impl BodySource for FakeStore {
    async fn open_body(&self, credential: &Credential, record: &Record) -> Result<ByteStream> {
        let id = record.id.as_str().to_string();
        let served = {
            let mut requests = self.body_requests.lock().unwrap();
            let count = requests.entry(id.clone()).or_insert(0);
            *count += 1;
            *count
        };
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or(BodyBehavior::Full);
        let body = self.body(&id);

        let bytes = match behavior {
            BodyBehavior::Full => body,
            BodyBehavior::TruncatedFor(n) if served <= n => body[..body.len() / 2].to_vec(),
            BodyBehavior::TruncatedFor(_) => body,
            BodyBehavior::AlwaysTruncated => body[..body.len() / 2].to_vec(),
            BodyBehavior::NotFound => {
                return Err(Error::Protocol(ProtocolError::new(
                    404,
                    Some("NOT_FOUND".to_string()),
                    None,
                )));
            }
            BodyBehavior::ExpireFirstToken => {
                if credential.access_token().as_str() == "token-1" {
                    // Hold the stale token long enough for every worker to see it.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    return Err(Error::Protocol(ProtocolError::new(
                        401,
                        Some("INVALID_SESSION_ID".to_string()),
                        Some("Session expired or invalid".to_string()),
                    )));
                }
                body
            }
            BodyBehavior::Panic => panic!("body endpoint exploded"),
            BodyBehavior::RateLimitedOnce(wait) if served == 1 => {
                return Err(Error::RateLimited {
                    retry_after: Some(wait),
                });
            }
            BodyBehavior::RateLimitedOnce(_) => body,
        };

        // Split into two chunks to exercise streaming writes.
        let mid = bytes.len() / 2;
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(&bytes[..mid])),
            Ok(Bytes::copy_from_slice(&bytes[mid..])),
        ];
        Ok(Box::pin(stream::iter(chunks)))
    }
}

pub fn record(id: &str, created: &str, len: u64, name: &str) -> Record {
    let value = json!({
        "Id": id,
        "CreatedDate": created,
        "BodyLength": len,
        "Name": name,
        "ContentType": "application/octet-stream",
    });
    let map: Map<String, Value> = match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    };
    Record::from_fields(map).unwrap()
}

pub fn transient() -> Error {
    Error::Transport(TransportError::Connection {
        message: "connection reset".to_string(),
    })
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter: Duration::ZERO,
        rate_limit_fallback: Duration::from_millis(1),
    }
}

pub fn config(dir: &Path, batch_size: u32) -> ExportConfig {
    ExportConfig {
        output_dir: dir.join("attachments"),
        checkpoint_path: dir.join("last_marker.json"),
        ledger_path: dir.join("attachments_metadata.csv"),
        concurrency: 4,
        batch_size,
        max_pages: None,
        retry: fast_retry(),
    }
}

pub struct Harness {
    pub store: Arc<FakeStore>,
    pub session: Session<Arc<FakeIdentity>>,
    pub identity: Arc<FakeIdentity>,
}

impl Harness {
    pub async fn new(store: FakeStore) -> Self {
        let identity = Arc::new(FakeIdentity::new());
        let session = Session::login(Arc::clone(&identity)).await.unwrap();
        Self {
            store: Arc::new(store),
            session,
            identity,
        }
    }

    pub async fn exporter(
        &self,
        config: ExportConfig,
    ) -> Exporter<FakeStore, FakeStore, Arc<FakeIdentity>> {
        Exporter::new(
            config,
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            self.session.clone(),
        )
        .await
        .unwrap()
    }

    pub async fn exporter_with_ledger(
        &self,
        config: ExportConfig,
        ledger: Arc<dyn MetadataLedger>,
    ) -> Exporter<FakeStore, FakeStore, Arc<FakeIdentity>> {
        Exporter::with_ledger(
            config,
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            self.session.clone(),
            ledger,
        )
        .await
        .unwrap()
    }

    pub fn logins(&self) -> usize {
        self.identity.logins.load(Ordering::SeqCst)
    }
}

pub fn ledger_ids(path: &Path) -> Vec<String> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().clone();
    let id_col = headers.iter().position(|h| h == "Id").unwrap();
    reader
        .records()
        .map(|r| r.unwrap()[id_col].to_string())
        .collect()
}
