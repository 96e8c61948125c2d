use std::fmt;
use std::io::Read;

use flate2::read::GzDecoder;
use reqwest::header::{HeaderMap, CONTENT_ENCODING, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode, Url};
use thiserror::Error;
use tracing::debug;

const ZIP_CONTENT_TYPE: &str = "application/zip";

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Status(StatusFailure),

    #[error("Too many redirects (limit {limit}) starting from {url}")]
    TooManyRedirects { url: String, limit: usize },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to decompress response body: {0}")]
    Decompress(std::io::Error),

    #[error("Invalid JSON in response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a text response but received binary content")]
    UnexpectedBinary,
}

impl HttpError {
    pub(crate) fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Decompress(_) | Self::Json(_))
    }

    /// Status code of an application-level failure
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(failure) => Some(failure.status),
            _ => None,
        }
    }
}

/// A completed exchange whose status was outside 2xx
#[derive(Debug, Clone)]
pub struct StatusFailure {
    pub status: StatusCode,
    /// Body after gzip decoding, never interpreted as text here
    pub body: Vec<u8>,
    pub headers: HeaderMap,
}

impl StatusFailure {
    /// Body as lossy UTF-8, for messages
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// `message` field of a JSON error body, if the API sent one
    fn api_message(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(&self.body).ok()?;
        value
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
    }
}

impl fmt::Display for StatusFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = self.api_message().unwrap_or_else(|| self.body_text());
        let detail = detail.trim();
        if detail.is_empty() {
            write!(f, "The API responded with {}", self.status)
        } else {
            write!(f, "The API responded with {}: {}", self.status, detail)
        }
    }
}

/// Decoded response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    /// `application/zip` content, delivered untouched
    Binary(Vec<u8>),
}

impl Body {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}

/// A successful (2xx) response
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Issues requests and applies the redirect, decoding and classification rules
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    max_redirects: usize,
}

impl HttpClient {
    /// Create a client following at most `max_redirects` redirects per GET
    pub fn new(max_redirects: usize) -> Result<Self, HttpError> {
        // Redirects are followed here, not by reqwest, so only GET 301/302 qualify.
        let client = Client::builder().redirect(Policy::none()).build()?;
        Ok(Self {
            client,
            max_redirects,
        })
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    /// Perform one request, following redirects for GET
    ///
    /// Non-2xx statuses come back as `HttpError::Status` carrying the decoded
    /// body and headers; connection failures as `HttpError::Transport`.
    pub async fn perform(
        &self,
        method: Method,
        payload: Option<&[u8]>,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<Response, HttpError> {
        let start = url;
        let mut url = Url::parse(url).map_err(|_| HttpError::InvalidUrl(url.to_string()))?;
        let mut redirects = 0;

        loop {
            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(payload) = payload {
                request = request.body(payload.to_vec());
            }

            let response = request.send().await?;
            let status = response.status();

            if let Some(location) = redirect_target(&method, status, response.headers()) {
                if redirects >= self.max_redirects {
                    return Err(HttpError::TooManyRedirects {
                        url: start.to_string(),
                        limit: self.max_redirects,
                    });
                }
                let next = url
                    .join(&location)
                    .map_err(|_| HttpError::InvalidUrl(location.clone()))?;
                debug!(from = %url, to = %next, status = status.as_u16(), "following redirect");
                redirects += 1;
                url = next;
                continue;
            }

            let response_headers = response.headers().clone();
            let raw = response.bytes().await?.to_vec();
            let body = decompress(&response_headers, raw)?;

            debug!(
                method = %method,
                url = %url,
                status = status.as_u16(),
                bytes = body.len(),
                "request completed"
            );

            return classify(status, response_headers, body);
        }
    }
}

fn redirect_target(method: &Method, status: StatusCode, headers: &HeaderMap) -> Option<String> {
    if *method != Method::GET
        || !(status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND)
    {
        return None;
    }
    headers
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn decompress(headers: &HeaderMap, body: Vec<u8>) -> Result<Vec<u8>, HttpError> {
    let gzipped = headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"));
    if !gzipped || body.is_empty() {
        return Ok(body);
    }

    let mut decoded = Vec::new();
    GzDecoder::new(body.as_slice())
        .read_to_end(&mut decoded)
        .map_err(HttpError::Decompress)?;
    Ok(decoded)
}

fn classify(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Result<Response, HttpError> {
    if !status.is_success() {
        return Err(HttpError::Status(StatusFailure {
            status,
            body,
            headers,
        }));
    }

    let is_zip = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(ZIP_CONTENT_TYPE));
    let body = if is_zip {
        Body::Binary(body)
    } else {
        Body::Text(String::from_utf8_lossy(&body).into_owned())
    };

    Ok(Response {
        status,
        headers,
        body,
    })
}
