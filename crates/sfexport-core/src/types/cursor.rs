//! Resumable position in the record total order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::{Record, RecordId, Timestamp};

/// Total order over records: creation timestamp descending, then identifier
/// ascending.
pub fn total_order(a: &Record, b: &Record) -> Ordering {
    b.created_date
        .cmp(&a.created_date)
        .then_with(|| a.id.cmp(&b.id))
}

/// The last position consumed by a scan.
///
/// A record is "after" the cursor when it is older than the cursor's
/// timestamp, or has the same timestamp and a greater identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(alias = "last_created_date")]
    pub last_timestamp: Timestamp,
    pub last_id: RecordId,
}

impl Cursor {
    /// Create a cursor at an explicit position.
    pub fn new(last_timestamp: Timestamp, last_id: RecordId) -> Self {
        Self {
            last_timestamp,
            last_id,
        }
    }

    /// The cursor positioned at `record`.
    pub fn at(record: &Record) -> Self {
        Self::new(record.created_date, record.id.clone())
    }

    /// Whether `record` lies strictly after this cursor in the total order.
    pub fn precedes(&self, record: &Record) -> bool {
        record.created_date < self.last_timestamp
            || (record.created_date == self.last_timestamp && record.id > self.last_id)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.last_timestamp, self.last_id)
    }
}

/// One page of records in total order.
#[derive(Debug, Clone)]
pub struct Page {
    /// The records in this page.
    pub records: Vec<Record>,
    /// Cursor at the page's last record; `None` for an empty page.
    pub next_cursor: Option<Cursor>,
    /// Whether the scan should continue; true iff the page is non-empty.
    pub has_more: bool,
}

impl Page {
    /// Build a page and derive its cursor from the last record.
    pub fn new(records: Vec<Record>) -> Self {
        let next_cursor = records.last().map(Cursor::at);
        let has_more = !records.is_empty();
        Self {
            records,
            next_cursor,
            has_more,
        }
    }

    /// Number of records in the page.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the page holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
