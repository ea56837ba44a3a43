//! Instance URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

use super::ApiVersion;

/// A validated base service URL of the remote record store.
///
/// The URL must be absolute and use HTTPS (HTTP is allowed for localhost).
/// It is normalized without a trailing slash so REST paths can be appended.
///
/// # Example
///
/// ```
/// use sfexport_core::{ApiVersion, InstanceUrl};
///
/// let base = InstanceUrl::new("https://acme.my.salesforce.com").unwrap();
/// let version = ApiVersion::new("62.0").unwrap();
/// assert_eq!(base.data_url(&version, "query/"),
///            "https://acme.my.salesforce.com/services/data/v62.0/query/");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceUrl(Url);

impl InstanceUrl {
    /// Create a new instance URL from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not valid or doesn't meet requirements.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| InvalidInputError::InstanceUrl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        Ok(Self(url))
    }

    /// Derive the instance URL from a login `serverUrl`.
    ///
    /// The identity endpoint answers with a SOAP service URL such as
    /// `https://acme.my.salesforce.com/services/Soap/u/57.0/00D...`; the
    /// instance is everything before `/services`.
    pub fn from_server_url(server_url: &str) -> Result<Self, Error> {
        let base = server_url
            .split_once("/services")
            .map_or(server_url, |(base, _)| base);
        Self::new(base)
    }

    /// Returns the URL of a versioned REST resource.
    pub fn data_url(&self, version: &ApiVersion, path: &str) -> String {
        format!(
            "{}/services/data/v{}/{}",
            self.base(),
            version,
            path.trim_start_matches('/')
        )
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    fn base(&self) -> &str {
        // The URL crate always adds a trailing slash to root paths.
        self.0.as_str().trim_end_matches('/')
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        if url.cannot_be_a_base() {
            return Err(InvalidInputError::InstanceUrl {
                value: original.to_string(),
                reason: "must be an absolute URL".to_string(),
            }
            .into());
        }

        let scheme = url.scheme();
        let is_localhost = url
            .host_str()
            .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "[::1]");

        if scheme != "https" && !(scheme == "http" && is_localhost) {
            return Err(InvalidInputError::InstanceUrl {
                value: original.to_string(),
                reason: "must use HTTPS (HTTP allowed only for localhost)".to_string(),
            }
            .into());
        }

        if url.host_str().is_none() {
            return Err(InvalidInputError::InstanceUrl {
                value: original.to_string(),
                reason: "must have a host".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl fmt::Display for InstanceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base())
    }
}

impl FromStr for InstanceUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for InstanceUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.base())
    }
}

impl<'de> Deserialize<'de> for InstanceUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        InstanceUrl::new(&s).map_err(serde::de::Error::custom)
    }
}
