//! # Kirjava - a GraphQL client over HTTP
//!
//! Kirjava sends GraphQL operations to a single server endpoint. It keeps a
//! history of completed calls, retries transient failures with exponential
//! backoff, and uploads files using the GraphQL multipart request convention.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kirjava::{Client, Operation};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), kirjava::Error> {
//!     let mut client = Client::new("https://api.example.com/graphql")?;
//!     client.set_header("Authorization", "Bearer secret")?;
//!
//!     // Send a plain query
//!     let result = client.execute("{ viewer { login } }").await?;
//!     println!("Login: {}", result["data"]["viewer"]["login"]);
//!
//!     // Send a query with variables, retrying on gateway errors
//!     let operation = Operation::new("query($id: ID!) { user(id: $id) { name } }")
//!         .variable("id", "42")
//!         .retries(3)
//!         .retry_statuses([502, 503, 504]);
//!     let result = client.execute(operation).await?;
//!
//!     // GraphQL errors are part of the result, not an `Err`
//!     if let Some(errors) = result.get("errors") {
//!         eprintln!("GraphQL errors: {}", errors);
//!     }
//!
//!     for entry in client.history() {
//!         println!("{} -> {}", entry.request.query, entry.result);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## File uploads
//!
//! A variable holding a file, or a list of files, turns the request into a
//! multipart upload. Each file slot is sent as `null` in the operation and
//! the file travels as a separate part:
//!
//! ```no_run
//! use kirjava::{Client, InMemoryFile, Operation, PathFile, Variable};
//!
//! # async fn example() -> Result<(), kirjava::Error> {
//! let mut client = Client::new("https://api.example.com/graphql")?;
//!
//! let operation = Operation::new(
//!     "mutation($cover: Upload!, $pages: [Upload!]!) { publish(cover: $cover, pages: $pages) }",
//! )
//! .variable("cover", PathFile::new("cover.png"))
//! .variable(
//!     "pages",
//!     Variable::files([InMemoryFile::new("1.txt", "one"), InMemoryFile::new("2.txt", "two")]),
//! );
//!
//! client.execute(operation).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## One-off calls
//!
//! [`execute`] and [`execute_with_headers`] build a throwaway client for a
//! single call:
//!
//! ```no_run
//! # async fn example() -> Result<(), kirjava::Error> {
//! let result = kirjava::execute("https://api.example.com/graphql", "{ name }").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod history;
pub mod operation;
mod response;
pub mod retry;
pub mod session;
pub mod upload;
pub mod variables;

pub use client::{Client, ClientBuilder};
pub use error::{BoxError, Error, Result};
pub use history::{HistoryEntry, RequestRecord};
pub use operation::Operation;
pub use response::{describe, HttpResponse};
pub use retry::{RetryPolicy, RetryStep, RetryingRequester};
pub use session::{HttpRequest, HttpSession, ReqwestSession, RequestBody};
pub use upload::{build_map, pack_files, FilePayload, MultipartUpload};
pub use variables::{
    partition, FileMap, FileRef, FileSlot, FileSource, InMemoryFile, Partitioned, PathFile,
    Variable, Variables,
};

use serde_json::Value;

/// Sends one operation to `url` without keeping a client around.
///
/// Equivalent to creating a [`Client`] with default settings, calling
/// [`Client::execute`], and dropping the client along with its history.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the call fails.
pub async fn execute(url: impl AsRef<str>, operation: impl Into<Operation>) -> Result<Value> {
    Client::new(url)?.execute(operation).await
}

/// Like [`execute`], with extra headers merged into the default ones.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> Result<(), kirjava::Error> {
/// let result = kirjava::execute_with_headers(
///     "https://api.example.com/graphql",
///     "{ viewer { login } }",
///     [("Authorization", "Bearer secret")],
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if the URL or a header is invalid, or the call fails.
pub async fn execute_with_headers<I, K, V>(
    url: impl AsRef<str>,
    operation: impl Into<Operation>,
    headers: I,
) -> Result<Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut client = Client::new(url)?;
    for (name, value) in headers {
        client.set_header(name, value)?;
    }
    client.execute(operation).await
}
