//! Attachment record type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, InvalidInputError};
use crate::schema;

use super::Timestamp;

/// Extension used when a record's display name carries none.
const FALLBACK_EXTENSION: &str = ".bin";

/// An opaque, globally unique record identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Create a record identifier, rejecting values that cannot name a file.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        if s.is_empty() {
            return Err(InvalidInputError::Record {
                reason: "identifier cannot be empty".to_string(),
            }
            .into());
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(InvalidInputError::Record {
                reason: format!("identifier '{}' must be alphanumeric", s),
            }
            .into());
        }
        Ok(Self(s))
    }

    /// Returns the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One attachment-like record as returned by the query endpoint.
///
/// The typed fields are the ones the exporter relies on; the complete field
/// map is kept as-is for the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Unique identifier.
    pub id: RecordId,
    /// Creation timestamp (primary sort key, not unique).
    pub created_date: Timestamp,
    /// Declared body size in bytes.
    pub body_length: u64,
    /// Display name, used to derive the file extension.
    pub name: Option<String>,
    /// All selected fields, keyed by field name.
    pub fields: Map<String, Value>,
}

impl Record {
    /// Build a record from a query result object.
    ///
    /// The store's `attributes` envelope is dropped.
    pub fn from_fields(mut fields: Map<String, Value>) -> Result<Self, Error> {
        fields.remove("attributes");

        let id = match fields.get(schema::ID) {
            Some(Value::String(id)) => RecordId::new(id.as_str())?,
            _ => return Err(missing(schema::ID)),
        };

        let created_date = match fields.get(schema::CREATED_DATE) {
            Some(Value::String(ts)) => Timestamp::parse(ts)?,
            _ => return Err(missing(schema::CREATED_DATE)),
        };

        let body_length = fields
            .get(schema::BODY_LENGTH)
            .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
            .ok_or_else(|| missing(schema::BODY_LENGTH))?;

        let name = fields
            .get(schema::NAME)
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            id,
            created_date,
            body_length,
            name,
            fields,
        })
    }

    /// The file extension derived from the display name, including the dot.
    ///
    /// Falls back to `.bin` when the name is missing or has no extension.
    pub fn file_extension(&self) -> String {
        self.name
            .as_deref()
            .and_then(extension_of)
            .map(|ext| format!(".{}", ext))
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
    }

    /// Deterministic local file name: `<id><ext>`.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.id, self.file_extension())
    }

    /// Render a field as ledger text; missing and null fields are empty.
    pub fn field_text(&self, field: &str) -> String {
        match self.fields.get(field) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

fn missing(field: &str) -> Error {
    InvalidInputError::Record {
        reason: format!("missing or mistyped field '{}'", field),
    }
    .into()
}

/// Extension of the final path component, without the dot.
///
/// Leading-dot names like `.profile` have no extension, and characters that
/// are not safe in a file name disqualify the extension.
fn extension_of(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    ext.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        .then_some(ext)
}
