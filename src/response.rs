//! HTTP responses as seen by the client, and diagnostics for bodies that are
//! not JSON.

use crate::client::parse_header;
use crate::Result;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use serde_json::Value;

/// Bodies shorter than this many characters are quoted in diagnostics.
const EXCERPT_LIMIT: usize = 256;

/// A raw HTTP response returned by an [`HttpSession`](crate::HttpSession).
///
/// The body is kept as bytes so a response that fails to parse can still be
/// described.
///
/// # Examples
///
/// ```
/// use kirjava::HttpResponse;
/// use http::StatusCode;
///
/// let response = HttpResponse::new(StatusCode::OK, r#"{"data": {"name": "X"}}"#)
///     .with_header("content-type", "application/json")
///     .unwrap();
///
/// assert_eq!(response.json().unwrap()["data"]["name"], "X");
/// assert_eq!(response.content_type(), Some("application/json"));
/// ```
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The raw response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a response with no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`](crate::Error::ConfigurationError)
    /// if the header name or value is invalid.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Parses the body as JSON.
    pub fn json(&self) -> std::result::Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Decodes the body as UTF-8, or `None` if it is not valid UTF-8.
    pub fn text(&self) -> Option<String> {
        String::from_utf8(self.body.to_vec()).ok()
    }

    /// Returns the `Content-Type` header, if present and printable.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

/// Describes a response whose body could not be parsed as JSON.
///
/// The message names the content type the server sent. When the body decodes
/// as text shorter than 256 characters, it is appended after a newline.
///
/// # Examples
///
/// ```
/// use kirjava::{describe, HttpResponse};
/// use http::StatusCode;
///
/// let response = HttpResponse::new(StatusCode::OK, "<html></html>")
///     .with_header("content-type", "text/html")
///     .unwrap();
///
/// assert_eq!(
///     describe(&response),
///     "Server did not return JSON, it returned text/html:\n<html></html>"
/// );
/// ```
pub fn describe(response: &HttpResponse) -> String {
    let content_type = response.content_type().unwrap_or("unknown");
    let mut message = format!("Server did not return JSON, it returned {content_type}");

    if let Some(content) = response.text() {
        if !content.is_empty() && content.chars().count() < EXCERPT_LIMIT {
            message.push_str(":\n");
            message.push_str(&content);
        }
    }

    message
}
