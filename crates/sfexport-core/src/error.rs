//! Error types for the exporter.
//!
//! One unified error type with explicit variant families so callers can tell
//! a run-terminating failure (authentication, page fetch) from a per-record
//! one (transfer, integrity) and decide whether to retry.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The unified error type for export operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout, body stream).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (rejected credentials, expired session).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Protocol errors (unexpected status codes or response bodies).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The remote store asked us to slow down.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// A transfer completed but did not produce the declared body.
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// Local persistence errors (checkpoint, ledger, downloaded files).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation errors (malformed records, URLs, configuration).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// Whether this error means the bearer credential is no longer accepted.
    pub fn is_session_expired(&self) -> bool {
        match self {
            Error::Auth(AuthError::SessionExpired) => true,
            Error::Protocol(err) => err.is_session_expired(),
            _ => false,
        }
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// The response body stream broke off.
    #[error("body stream interrupted: {message}")]
    Stream { message: String },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity endpoint rejected the credentials.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The session token has expired or was revoked.
    #[error("session expired")]
    SessionExpired,

    /// The identity endpoint answered with something we could not use.
    #[error("unexpected login response: {0}")]
    MalformedResponse(String),
}

/// Protocol-level errors from the REST API.
#[derive(Debug)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// API error code (if present), e.g. `INVALID_SESSION_ID`.
    pub error_code: Option<String>,
    /// Error message from the server.
    pub message: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref code) = self.error_code {
            write!(f, " [{}]", code)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, error_code: Option<String>, message: Option<String>) -> Self {
        Self {
            status,
            error_code,
            message,
        }
    }

    /// Check if this response signals an expired session.
    pub fn is_session_expired(&self) -> bool {
        self.status == 401 || self.error_code.as_deref() == Some("INVALID_SESSION_ID")
    }

    /// Server-side and timeout statuses that are worth another attempt.
    pub fn is_transient(&self) -> bool {
        self.status >= 500 || self.status == 408
    }
}

/// Body integrity errors.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// The number of bytes written differs from the declared body length.
    #[error("size mismatch: wrote {actual} bytes, expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// Local storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A filesystem operation failed.
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted file exists but cannot be understood.
    #[error("corrupt file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Encoding a value for persistence failed.
    #[error("encoding failed: {message}")]
    Encode { message: String },
}

impl StorageError {
    /// Wrap an I/O error with the operation and path it belongs to.
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid instance URL.
    #[error("invalid instance URL '{value}': {reason}")]
    InstanceUrl { value: String, reason: String },

    /// Invalid API version.
    #[error("invalid API version '{value}': {reason}")]
    ApiVersion { value: String, reason: String },

    /// Invalid or missing record field.
    #[error("invalid record: {reason}")]
    Record { reason: String },

    /// Invalid timestamp.
    #[error("invalid timestamp '{value}': {reason}")]
    Timestamp { value: String, reason: String },

    /// Invalid configuration value.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_display_includes_code_and_message() {
        let err = ProtocolError::new(
            400,
            Some("MALFORMED_QUERY".to_string()),
            Some("unexpected token".to_string()),
        );
        assert_eq!(err.to_string(), "HTTP 400 [MALFORMED_QUERY]: unexpected token");
    }

    #[test]
    fn expiry_detected_from_status_or_code() {
        assert!(ProtocolError::new(401, None, None).is_session_expired());
        assert!(
            ProtocolError::new(403, Some("INVALID_SESSION_ID".to_string()), None)
                .is_session_expired()
        );
        assert!(!ProtocolError::new(403, None, None).is_session_expired());
        assert!(Error::Auth(AuthError::SessionExpired).is_session_expired());
    }

    #[test]
    fn transient_statuses() {
        assert!(ProtocolError::new(503, None, None).is_transient());
        assert!(ProtocolError::new(408, None, None).is_transient());
        assert!(!ProtocolError::new(404, None, None).is_transient());
    }
}
