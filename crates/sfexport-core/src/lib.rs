//! sfexport-core - Core types, traits and paging for the attachment exporter.
//!
//! The crate owns the pieces with real invariants: the total order over
//! records and the resumable [`Cursor`], the shared credential [`Session`]
//! with coalesced refresh, the [`PagedQuery`] that walks the record set one
//! page at a time, and the [`RetryPolicy`] consumed by the download engine.
//! Transport and storage live in sibling crates behind the traits in
//! [`traits`].

pub mod credentials;
pub mod error;
pub mod query;
pub mod retry;
pub mod schema;
pub mod session;
pub mod tokens;
pub mod traits;
pub mod types;

pub use credentials::Credentials;
pub use error::Error;
pub use query::{PageRequest, PagedQuery};
pub use retry::{RetryDecision, RetryFailure, RetryPolicy, attempt_with_policy};
pub use session::{Credential, Session};
pub use tokens::AccessToken;
pub use traits::{
    BodySource, ByteStream, IdentityProvider, MetadataLedger, RecordSource, SessionGrant,
};
pub use types::{ApiVersion, Cursor, InstanceUrl, Page, Record, RecordId, Timestamp};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
