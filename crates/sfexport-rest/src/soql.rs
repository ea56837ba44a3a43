//! Page query construction.

use std::fmt;
use std::str::FromStr;

use sfexport_core::error::{Error, InvalidInputError};
use sfexport_core::schema;
use sfexport_core::{PageRequest, Result};

/// An object type name safe to splice into a query and a URL path.
///
/// # Example
///
/// ```
/// use sfexport_rest::SObjectName;
///
/// assert!(SObjectName::new("Attachment").is_ok());
/// assert!(SObjectName::new("Custom_File__c").is_ok());
/// assert!(SObjectName::new("Attachment; DROP").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SObjectName(String);

impl SObjectName {
    /// Validate an object type name.
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        let starts_with_letter = s.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
        if !starts_with_letter || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::InvalidInput(InvalidInputError::Config {
                message: format!("'{}' is not a valid object type name", s),
            }));
        }
        Ok(Self(s))
    }

    /// Returns the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SObjectName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Build the query for one page.
///
/// Selects `fields`, keeps records with a non-empty body that lie strictly
/// after `request.after`, orders them newest first with ties broken by
/// ascending identifier, and limits to `request.limit`.
pub fn build_page_query(sobject: &SObjectName, fields: &[&str], request: &PageRequest) -> String {
    let mut soql = format!(
        "SELECT {} FROM {} WHERE {} > 0",
        fields.join(", "),
        sobject,
        schema::BODY_LENGTH
    );

    if let Some(cursor) = &request.after {
        let ts = cursor.last_timestamp.to_literal();
        soql.push_str(&format!(
            " AND ({created} < {ts} OR ({created} = {ts} AND {id} > '{last_id}'))",
            created = schema::CREATED_DATE,
            id = schema::ID,
            last_id = cursor.last_id,
        ));
    }

    soql.push_str(&format!(
        " ORDER BY {} DESC, {} ASC LIMIT {}",
        schema::CREATED_DATE,
        schema::ID,
        request.limit
    ));
    soql
}
