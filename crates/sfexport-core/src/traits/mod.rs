//! Seams between the core and its transports.

mod identity;
mod ledger;
mod source;

pub use identity::{IdentityProvider, SessionGrant};
pub use ledger::MetadataLedger;
pub use source::{BodySource, ByteStream, RecordSource};
