//! GraphQL client with call history and retry logic.
//!
//! The [`Client`] type is the main entry point for sending operations.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    history::{HistoryEntry, RequestRecord},
    operation::{Operation, OperationBody},
    response::describe,
    retry::{RetryingRequester, DEFAULT_BACKOFF_UNIT},
    session::{HttpRequest, HttpSession, ReqwestSession, RequestBody},
    upload::MultipartUpload,
    variables::partition,
    Error, Result,
};
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use url::Url;

/// A GraphQL client bound to a single server endpoint.
///
/// The client owns its HTTP session, which is reused for every call so
/// connections stay alive. It also owns a set of headers sent with every
/// request and a history of completed calls, most recent first.
///
/// `execute` takes `&mut self`: calls on one client are sequential. Share a
/// client across tasks by wrapping it in a mutex.
///
/// # Examples
///
/// ```no_run
/// use kirjava::{Client, InMemoryFile, Operation};
///
/// # async fn example() -> Result<(), kirjava::Error> {
/// let mut client = Client::new("https://api.example.com/graphql")?;
/// client.set_header("Authorization", "Bearer secret")?;
///
/// let result = client.execute("{ viewer { login } }").await?;
/// println!("Login: {}", result["data"]["viewer"]["login"]);
///
/// let upload = Operation::new("mutation($file: Upload!) { upload(file: $file) }")
///     .variable("file", InMemoryFile::new("notes.txt", "hello"))
///     .retries(3)
///     .retry_statuses([502, 503]);
/// client.execute(upload).await?;
///
/// assert_eq!(client.history().len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct Client {
    url: String,
    endpoint: Url,
    headers: HeaderMap,
    history: Vec<HistoryEntry>,
    session: Box<dyn HttpSession>,
    backoff_unit: Duration,
}

impl Client {
    /// Creates a client for `url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP session cannot be
    /// created.
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        Self::builder().url(url)?.build()
    }

    /// Creates a new `ClientBuilder` for configuring a client.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kirjava::Client;
    /// use std::time::Duration;
    ///
    /// # fn example() -> Result<(), kirjava::Error> {
    /// let client = Client::builder()
    ///     .url("https://api.example.com/graphql")?
    ///     .timeout(Duration::from_secs(30))
    ///     .default_header("User-Agent", "my-app/1.0")?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The URL of the GraphQL server, as given.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The headers sent with every request.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the headers sent with every request.
    ///
    /// Changes apply to calls started afterwards.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets a header sent with every subsequent request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<()> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// The calls made so far that received a JSON response, most recent first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Sends an operation to the server and returns the parsed JSON response.
    ///
    /// Variables holding files turn the request into a GraphQL multipart
    /// upload; otherwise the operation is sent as a single JSON document.
    /// GraphQL `errors` in the response are returned as part of the result,
    /// not as an error.
    ///
    /// On success the call is recorded at the front of [`history`](Self::history).
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] or [`Error::RetryableStatus`] if every attempt failed;
    /// - [`Error::NonJsonResponse`] if the final response is not JSON;
    /// - [`Error::FileRead`] if a file variable cannot be read.
    pub async fn execute(&mut self, operation: impl Into<Operation>) -> Result<Value> {
        let operation = operation.into();
        let start_time = Instant::now();

        let mut headers = self.headers.clone();
        let split = partition(operation.variables.as_ref());
        let operations = serde_json::to_string(&OperationBody {
            variables: split.variables.as_ref(),
            query: &operation.query,
        })?;

        let body = if split.files.is_empty() {
            RequestBody::Json(operations)
        } else {
            headers.remove(CONTENT_TYPE);
            RequestBody::Multipart(MultipartUpload::new(operations, &split.files)?)
        };

        let request = HttpRequest {
            method: operation.method.clone(),
            url: self.endpoint.clone(),
            headers,
            body,
        };

        let policy = operation.retry_policy(self.backoff_unit);
        let response = RetryingRequester::new(self.session.as_ref(), &policy)
            .send(&request)
            .await?;

        tracing::info!(
            status = response.status.as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "Received GraphQL response"
        );

        let result = match response.json() {
            Ok(result) => result,
            Err(e) => {
                let message = describe(&response);
                tracing::error!(
                    error = %e,
                    status = response.status.as_u16(),
                    message = %message,
                    "Response is not JSON"
                );
                return Err(Error::NonJsonResponse {
                    message,
                    status: response.status,
                });
            }
        };

        self.history.insert(
            0,
            HistoryEntry::new(
                RequestRecord {
                    query: operation.query,
                    variables: split.variables.unwrap_or_default(),
                },
                result.clone(),
            ),
        );

        Ok(result)
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Client (URL: {})>", self.url)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("history", &self.history.len())
            .field("backoff_unit", &self.backoff_unit)
            .finish_non_exhaustive()
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
    Ok((name, value))
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use kirjava::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), kirjava::Error> {
/// let client = ClientBuilder::new()
///     .url("https://api.example.com/graphql")?
///     .timeout(Duration::from_secs(30))
///     .backoff_unit(Duration::from_millis(500))
///     .default_header("Authorization", "Bearer secret")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    url: Option<(String, Url)>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    backoff_unit: Duration,
    session: Option<Box<dyn HttpSession>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    ///
    /// The default headers are `Accept: application/json` and
    /// `Content-Type: application/json`.
    pub fn new() -> Self {
        Self {
            url: None,
            default_headers: default_headers(),
            timeout: None,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            session: None,
        }
    }

    /// Sets the URL of the GraphQL server.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let raw = url.as_ref();
        self.url = Some((raw.to_string(), Url::parse(raw)?));
        Ok(self)
    }

    /// Adds a header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the per-request timeout of the default session.
    ///
    /// Ignored when a custom session is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the unit of the exponential backoff between retries.
    ///
    /// The `k`-th retry waits `unit * 2^k`. Defaults to one second.
    pub fn backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Uses a custom HTTP session instead of the default `reqwest` one.
    pub fn session(mut self, session: impl HttpSession + 'static) -> Self {
        self.session = Some(Box::new(session));
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no URL was provided or the HTTP session cannot be
    /// created.
    pub fn build(self) -> Result<Client> {
        let (url, endpoint) = self
            .url
            .ok_or_else(|| Error::ConfigurationError("URL is required".to_string()))?;

        let session = match self.session {
            Some(session) => session,
            None => Box::new(ReqwestSession::new(self.timeout)?),
        };

        Ok(Client {
            url,
            endpoint,
            headers: self.default_headers,
            history: Vec::new(),
            session,
            backoff_unit: self.backoff_unit,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
