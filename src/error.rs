//! Error types for GraphQL calls.
//!
//! Every failure of [`Client::execute`](crate::Client::execute) is reported
//! through [`Error`]. GraphQL-level errors (an `"errors"` member inside an
//! otherwise valid JSON body) are *not* errors at this layer; they are
//! returned to the caller as part of the result.

use http::StatusCode;

/// A boxed error produced by an [`HttpSession`](crate::HttpSession) implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for GraphQL calls.
///
/// # Examples
///
/// ```no_run
/// use kirjava::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let mut client = Client::new("https://api.example.com/graphql")?;
///
/// match client.execute("{ viewer { login } }").await {
///     Ok(result) => println!("Result: {}", result),
///     Err(Error::NonJsonResponse { message, .. }) => eprintln!("{}", message),
///     Err(e) if e.is_retryable() => eprintln!("Transient failure: {}", e),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The HTTP session failed to complete the exchange (connection refused,
    /// DNS failure, timeout, etc.).
    ///
    /// Retried up to the operation's retry limit, then returned unchanged.
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// The server answered with a status code the operation asked to retry on,
    /// and every retry also ended in a failure.
    #[error("Server responded with retryable status {status}")]
    RetryableStatus {
        /// The status code of the last attempt.
        status: StatusCode,
    },

    /// The final response body could not be parsed as JSON.
    ///
    /// The message describes the content type the server sent, followed by a
    /// short excerpt of the body when it is small enough to be useful.
    #[error("{message}")]
    NonJsonResponse {
        /// The human-readable diagnostic.
        message: String,
        /// The HTTP status code of the response.
        status: StatusCode,
    },

    /// The operation could not be encoded as JSON.
    #[error("Failed to serialize operation: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A file variable could not be read while packing the upload.
    #[error("Failed to read file {name}: {source}")]
    FileRead {
        /// The file's name.
        name: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration was provided, such as an invalid header.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The client was given an invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Wraps any session-level failure as [`Error::Transport`].
    pub fn transport(error: impl Into<BoxError>) -> Self {
        Error::Transport(error.into())
    }

    /// Returns `true` if the retry loop treats this error as transient.
    ///
    /// Transport failures and retryable statuses are retried; everything
    /// else ends the call immediately.
    ///
    /// # Examples
    ///
    /// ```
    /// use kirjava::Error;
    /// use http::StatusCode;
    ///
    /// let err = Error::RetryableStatus { status: StatusCode::BAD_GATEWAY };
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::ConfigurationError("bad header".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::RetryableStatus { .. } => true,
            Error::NonJsonResponse { .. } => false,
            Error::Serialization(_) => false,
            Error::FileRead { .. } => false,
            Error::ConfigurationError(_) => false,
            Error::InvalidUrl(_) => false,
        }
    }

    /// Returns the HTTP status code if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::RetryableStatus { status } => Some(*status),
            Error::NonJsonResponse { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Transport(Box::new(error))
    }
}

/// A specialized `Result` type for GraphQL calls.
pub type Result<T> = std::result::Result<T, Error>;
