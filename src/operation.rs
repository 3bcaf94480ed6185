//! Per-call parameters of [`Client::execute`](crate::Client::execute).

use crate::retry::RetryPolicy;
use crate::variables::{Variable, Variables};
use http::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::time::Duration;

/// A GraphQL operation and how to send it.
///
/// Defaults: `POST`, no variables, no retries, no retry statuses.
///
/// # Examples
///
/// ```
/// use kirjava::{InMemoryFile, Operation};
/// use http::Method;
///
/// let operation = Operation::new("mutation($image: Upload!) { upload(image: $image) }")
///     .variable("image", InMemoryFile::new("a.txt", "hello"))
///     .retries(2)
///     .retry_statuses([502, 503]);
///
/// assert_eq!(operation.method, Method::POST);
/// assert_eq!(operation.retries, 2);
///
/// // A bare query string is an operation with default settings.
/// let query: Operation = "{ name }".into();
/// assert!(query.variables.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Operation {
    /// The query or mutation document.
    pub query: String,
    /// The HTTP method.
    pub method: Method,
    /// Variables for the operation, if any.
    pub variables: Option<Variables>,
    /// How many times to retry after the first attempt.
    pub retries: usize,
    /// Status codes that trigger a retry.
    pub retry_statuses: Option<HashSet<u16>>,
}

impl Operation {
    /// Creates an operation for `query` with default settings.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            method: Method::POST,
            variables: None,
            retries: 0,
            retry_statuses: None,
        }
    }

    /// Sets the HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Replaces all variables.
    pub fn variables(mut self, variables: impl Into<Variables>) -> Self {
        self.variables = Some(variables.into());
        self
    }

    /// Sets a single variable.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Variable>) -> Self {
        self.variables
            .get_or_insert_with(Variables::new)
            .insert(name, value);
        self
    }

    /// Sets the number of retries after the first attempt.
    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the status codes that trigger a retry.
    pub fn retry_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retry_statuses = Some(statuses.into_iter().collect());
        self
    }

    /// Builds the retry policy for this operation.
    pub(crate) fn retry_policy(&self, backoff_unit: Duration) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            retry_statuses: self.retry_statuses.clone(),
            backoff_unit,
        }
    }
}

impl From<&str> for Operation {
    fn from(query: &str) -> Self {
        Operation::new(query)
    }
}

impl From<String> for Operation {
    fn from(query: String) -> Self {
        Operation::new(query)
    }
}

/// The JSON document sent to the server: `{"variables": …, "query": …}`.
#[derive(Debug, Serialize)]
pub(crate) struct OperationBody<'a> {
    pub variables: Option<&'a Map<String, Value>>,
    pub query: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let operation = Operation::new("{ name }");
        assert_eq!(operation.query, "{ name }");
        assert_eq!(operation.method, Method::POST);
        assert!(operation.variables.is_none());
        assert_eq!(operation.retries, 0);
        assert!(operation.retry_statuses.is_none());
    }

    #[test]
    fn test_variable_builds_variables_in_order() {
        let operation = Operation::new("q")
            .method(Method::GET)
            .variable("b", 1i64)
            .variable("a", "x");

        assert_eq!(operation.method, Method::GET);
        let keys: Vec<_> = operation.variables.as_ref().unwrap().keys().collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn test_variables_from_json_object() {
        let map = json!({"S": "T"}).as_object().cloned().unwrap();
        let operation = Operation::new("q").variables(map);
        assert!(operation.variables.unwrap().get("S").is_some());
    }

    #[test]
    fn test_retry_policy_uses_backoff_unit() {
        let policy = Operation::new("q")
            .retries(4)
            .retry_statuses([500])
            .retry_policy(Duration::from_millis(5));

        assert_eq!(policy.retries, 4);
        assert_eq!(policy.backoff_unit, Duration::from_millis(5));
        assert!(policy.retries_status(http::StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_body_field_order() {
        let variables = json!({"S": "T"}).as_object().cloned().unwrap();
        let body = OperationBody {
            variables: Some(&variables),
            query: "MESSAGE",
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"variables":{"S":"T"},"query":"MESSAGE"}"#
        );

        let body = OperationBody {
            variables: None,
            query: "MESSAGE",
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"variables":null,"query":"MESSAGE"}"#
        );
    }
}
