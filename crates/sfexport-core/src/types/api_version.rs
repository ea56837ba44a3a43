//! REST API version type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

/// A validated REST API version such as `62.0`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiVersion(String);

impl ApiVersion {
    /// Create a new API version, accepting an optional leading `v`.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let raw = s.as_ref();
        let s = raw.strip_prefix('v').unwrap_or(raw);

        let Some((major, minor)) = s.split_once('.') else {
            return Err(InvalidInputError::ApiVersion {
                value: raw.to_string(),
                reason: "expected <major>.<minor>".to_string(),
            }
            .into());
        };

        let numeric = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
        if !numeric(major) || !numeric(minor) {
            return Err(InvalidInputError::ApiVersion {
                value: raw.to_string(),
                reason: "major and minor must be numbers".to_string(),
            }
            .into());
        }

        Ok(Self(s.to_string()))
    }

    /// Returns the version without the `v` prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApiVersion> for String {
    fn from(value: ApiVersion) -> Self {
        value.0
    }
}
