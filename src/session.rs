//! The HTTP transport used by the client.
//!
//! [`HttpSession`] is the seam between request construction and the network:
//! it sends one fully built request and hands back the raw response. The
//! default implementation, [`ReqwestSession`], wraps a single
//! [`reqwest::Client`] so connections are pooled and kept alive across calls.

use crate::response::HttpResponse;
use crate::upload::MultipartUpload;
use crate::Result;
use async_trait::async_trait;
use http::{HeaderMap, Method};
use std::time::Duration;
use url::Url;

/// The body of an outgoing request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// A JSON document, sent as-is.
    Json(String),
    /// A GraphQL multipart upload. The transport chooses the boundary and
    /// sets its own `Content-Type`.
    Multipart(MultipartUpload),
}

/// One request, ready to be sent.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method.
    pub method: Method,
    /// The target URL.
    pub url: Url,
    /// Headers to send, already copied from the client.
    pub headers: HeaderMap,
    /// The request body.
    pub body: RequestBody,
}

impl HttpRequest {
    /// Returns `true` if this request carries a multipart upload.
    pub fn is_multipart(&self) -> bool {
        matches!(self.body, RequestBody::Multipart(_))
    }
}

/// Sends HTTP requests on behalf of a [`Client`](crate::Client).
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status; only failures to complete the exchange are errors,
/// typically [`Error::Transport`](crate::Error::Transport).
///
/// # Examples
///
/// ```
/// use kirjava::{HttpRequest, HttpResponse, HttpSession, Result};
/// use async_trait::async_trait;
/// use http::StatusCode;
///
/// struct AlwaysEmpty;
///
/// #[async_trait]
/// impl HttpSession for AlwaysEmpty {
///     async fn send(&self, _request: HttpRequest) -> Result<HttpResponse> {
///         Ok(HttpResponse::new(StatusCode::OK, "{}"))
///     }
/// }
/// ```
#[async_trait]
pub trait HttpSession: Send + Sync {
    /// Sends `request` and returns the server's response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// An [`HttpSession`] backed by a pooled [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestSession {
    http_client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestSession {
    /// Creates a session with an optional per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let http_client = reqwest::Client::builder().build().map_err(|e| {
            crate::Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self {
            http_client,
            timeout,
        })
    }

    /// Wraps an existing `reqwest` client.
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            timeout: None,
        }
    }
}

#[async_trait]
impl HttpSession for ReqwestSession {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .http_client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            RequestBody::Json(body) => builder.body(body),
            RequestBody::Multipart(upload) => builder.multipart(upload.to_form()?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
