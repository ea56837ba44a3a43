//! Partner SOAP login.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, instrument, warn};

use sfexport_core::error::{AuthError, Error, ProtocolError};
use sfexport_core::{AccessToken, Credentials, IdentityProvider, InstanceUrl, Result, SessionGrant};

use crate::client::{REQUEST_TIMEOUT, RestClient, map_reqwest};

static SESSION_ID: LazyLock<Regex> = LazyLock::new(|| element_regex("sessionId"));
static SERVER_URL: LazyLock<Regex> = LazyLock::new(|| element_regex("serverUrl"));
static FAULT_STRING: LazyLock<Regex> = LazyLock::new(|| element_regex("faultstring"));

/// Matches `<name>text</name>` with or without a namespace prefix.
fn element_regex(name: &str) -> Regex {
    Regex::new(&format!(
        r"<(?:[A-Za-z0-9_]+:)?{name}(?:\s[^>]*)?>([^<]*)</(?:[A-Za-z0-9_]+:)?{name}>"
    ))
    .unwrap_or_else(|e| panic!("invalid element pattern for {name}: {e}"))
}

/// Exchanges a username and password for a session through the SOAP
/// `login` call.
///
/// # Example
///
/// ```no_run
/// use sfexport_core::{Credentials, Session};
/// use sfexport_rest::{RestClient, SoapLogin};
///
/// # async fn example() -> sfexport_core::Result<()> {
/// let login = SoapLogin::new(
///     RestClient::new()?,
///     "https://login.salesforce.com/services/Soap/u/57.0",
///     Credentials::new("ops@example.com", "hunter2"),
/// );
/// let session = Session::login(login).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SoapLogin {
    client: RestClient,
    login_url: String,
    credentials: Credentials,
}

impl SoapLogin {
    /// Create a login against `login_url`.
    pub fn new(client: RestClient, login_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client,
            login_url: login_url.into(),
            credentials,
        }
    }
}

#[async_trait]
impl IdentityProvider for SoapLogin {
    #[instrument(skip(self), fields(url = %self.login_url, user = %self.credentials.username()))]
    async fn login(&self) -> Result<SessionGrant> {
        info!("Logging in");

        let response = self
            .client
            .http()
            .post(&self.login_url)
            .header(CONTENT_TYPE, "text/xml; charset=UTF-8")
            .header("SOAPAction", "login")
            .body(envelope(&self.credentials))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(map_reqwest)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest)?;

        if let Some(fault) = capture(&FAULT_STRING, &body) {
            warn!(status = %status, "Login rejected");
            return Err(Error::Auth(AuthError::InvalidCredentials(fault)));
        }

        if !status.is_success() {
            return Err(Error::Protocol(ProtocolError::new(
                status.as_u16(),
                None,
                Some("login failed without a SOAP fault".to_string()),
            )));
        }

        let grant = parse_login_response(&body)?;
        debug!(instance = %grant.instance_url, "Login succeeded");
        Ok(grant)
    }
}

/// Build the SOAP request body.
fn envelope(credentials: &Credentials) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">
  <env:Body>
    <n1:login xmlns:n1="urn:partner.soap.sforce.com">
      <n1:username>{}</n1:username>
      <n1:password>{}</n1:password>
    </n1:login>
  </env:Body>
</env:Envelope>"#,
        escape_xml(credentials.username()),
        escape_xml(&credentials.secret()),
    )
}

/// Pull the session id and instance out of a login result.
fn parse_login_response(body: &str) -> Result<SessionGrant> {
    let session_id = capture(&SESSION_ID, body)
        .ok_or_else(|| AuthError::MalformedResponse("missing sessionId".to_string()))?;
    let server_url = capture(&SERVER_URL, body)
        .ok_or_else(|| AuthError::MalformedResponse("missing serverUrl".to_string()))?;

    Ok(SessionGrant {
        access_token: AccessToken::new(session_id),
        instance_url: InstanceUrl::from_server_url(&server_url)?,
    })
}

fn capture(pattern: &Regex, body: &str) -> Option<String> {
    pattern
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| unescape_xml(m.as_str().trim()))
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
