//! Login credentials type.

use std::fmt;

/// Login credentials for the identity endpoint.
///
/// Holds the username, the password and the optional security token that
/// the identity endpoint expects appended to the password.
///
/// # Security
///
/// The password and token are never exposed in Debug output.
///
/// # Example
///
/// ```
/// use sfexport_core::Credentials;
///
/// let creds = Credentials::new("ops@example.com", "hunter2").with_security_token("XYZ");
/// assert_eq!(creds.username(), "ops@example.com");
/// assert_eq!(creds.secret(), "hunter2XYZ");
/// ```
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
    security_token: Option<String>,
}

impl Credentials {
    /// Create new credentials without a security token.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            security_token: None,
        }
    }

    /// Attach a security token; it is appended to the password at login.
    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.security_token = (!token.is_empty()).then_some(token);
        self
    }

    /// Returns the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password with the security token appended.
    ///
    /// # Security
    ///
    /// Use this only when constructing the login request.
    pub fn secret(&self) -> String {
        match &self.security_token {
            Some(token) => format!("{}{}", self.password, token),
            None => self.password.clone(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field(
                "security_token",
                &self.security_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}
