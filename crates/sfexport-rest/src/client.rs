//! HTTP client shared by the login and REST calls.

use std::time::Duration;

use futures_util::{StreamExt, stream};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

use sfexport_core::error::{Error, InvalidInputError, ProtocolError, TransportError};
use sfexport_core::{ByteStream, Credential, Result};

/// Connection timeout for every request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request timeout for calls that return a bounded JSON or XML body.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest wait for response headers or for the next body chunk.
pub const STALL_TIMEOUT: Duration = Duration::from_secs(30);

/// One entry of the REST API's error array.
#[derive(Debug, Deserialize)]
struct ApiErrorEntry {
    message: Option<String>,
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

/// The REST API answers errors with an array; a few endpoints use a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorBody {
    Many(Vec<ApiErrorEntry>),
    One(ApiErrorEntry),
}

/// HTTP client for the REST API.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    stall_timeout: Duration,
}

impl RestClient {
    /// Create a new client with the default [`STALL_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        Self::with_stall_timeout(STALL_TIMEOUT)
    }

    /// Create a client that gives up on a response when the server sends
    /// nothing for `stall_timeout`, either before the headers or between
    /// body chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn with_stall_timeout(stall_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("sfexport/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(stall_timeout)
            .build()
            .map_err(map_reqwest)?;
        Ok(Self {
            http,
            stall_timeout,
        })
    }

    /// The underlying reqwest client.
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Authenticated GET returning a JSON body.
    #[instrument(skip(self, credential, query))]
    pub async fn get_json<R>(
        &self,
        credential: &Credential,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<R>
    where
        R: DeserializeOwned,
    {
        debug!("REST query");
        trace!(?query, "query parameters");

        let response = self
            .http
            .get(url)
            .query(query)
            .headers(auth_headers(credential)?)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(map_reqwest)?;

        let response = check_status(response).await?;
        response.json::<R>().await.map_err(map_reqwest)
    }

    /// Authenticated GET returning the body as a byte stream.
    #[instrument(skip(self, credential))]
    pub async fn get_stream(&self, credential: &Credential, url: &str) -> Result<ByteStream> {
        debug!("REST binary fetch");

        let request = self.http.get(url).headers(auth_headers(credential)?).send();
        let response = tokio::time::timeout(self.stall_timeout, request)
            .await
            .map_err(|_| Error::Transport(TransportError::Timeout))?
            .map_err(map_reqwest)?;

        let response = check_status(response).await?;
        let stall = self.stall_timeout;
        let body = Box::pin(response.bytes_stream());
        let stream = stream::unfold(Some(body), move |state| async move {
            let mut body = state?;
            match tokio::time::timeout(stall, body.next()).await {
                Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
                Ok(Some(Err(e))) => Some((Err(map_reqwest(e)), None)),
                Ok(None) => None,
                Err(_) => {
                    debug!(?stall, "Body stream stalled");
                    Some((Err(Error::Transport(TransportError::Timeout)), None))
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

/// Create authorization headers for authenticated requests.
fn auth_headers(credential: &Credential) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&format!("Bearer {}", credential.access_token().as_str()))
        .map_err(|_| {
            Error::InvalidInput(InvalidInputError::Config {
                message: "access token contains invalid header characters".to_string(),
            })
        })?;
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// Pass a successful response through, or turn a failed one into an error.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    trace!(status = %status, "REST response");

    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after(response.headers());
        debug!(?retry_after, "Rate limited");
        return Err(Error::RateLimited { retry_after });
    }

    Err(Error::Protocol(parse_error_response(response).await))
}

/// Parse a REST error response.
async fn parse_error_response(response: Response) -> ProtocolError {
    let status = response.status().as_u16();

    match response.json::<ApiErrorBody>().await {
        Ok(ApiErrorBody::Many(entries)) => match entries.into_iter().next() {
            Some(entry) => ProtocolError::new(status, entry.error_code, entry.message),
            None => ProtocolError::new(status, None, None),
        },
        Ok(ApiErrorBody::One(entry)) => ProtocolError::new(status, entry.error_code, entry.message),
        Err(_) => ProtocolError::new(status, None, None),
    }
}

/// `Retry-After` in delta-seconds form. HTTP dates are not honored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Map a reqwest error onto the transport error family.
pub(crate) fn map_reqwest(err: reqwest::Error) -> Error {
    let transport = if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection {
            message: err.to_string(),
        }
    } else if err.is_body() || err.is_decode() {
        TransportError::Stream {
            message: err.to_string(),
        }
    } else {
        TransportError::Http {
            message: err.to_string(),
        }
    };
    Error::Transport(transport)
}
