//! Core exporter types.
//!
//! These types enforce their invariants at construction time: a [`Record`]
//! always has an identifier, a timestamp and a body length, and a
//! [`Cursor`] always names a position in the record total order.

mod api_version;
mod cursor;
mod instance_url;
mod record;
mod timestamp;

pub use api_version::ApiVersion;
pub use cursor::{Cursor, Page, total_order};
pub use instance_url::InstanceUrl;
pub use record::{Record, RecordId};
pub use timestamp::Timestamp;
