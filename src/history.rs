//! Records of completed calls.

use serde::Serialize;
use serde_json::{Map, Value};

/// The request half of a [`HistoryEntry`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestRecord {
    /// The query or mutation document.
    pub query: String,
    /// The variables as sent, with `null` in place of every file. Empty when
    /// the call had no variables.
    pub variables: Map<String, Value>,
}

/// A call that received a JSON response, with that response.
///
/// Entries are recorded even when the result contains GraphQL `errors`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// What was sent.
    pub request: RequestRecord,
    /// The parsed response body.
    pub result: Value,
}

impl HistoryEntry {
    /// Pairs a request with the result it received.
    pub fn new(request: RequestRecord, result: Value) -> Self {
        Self { request, result }
    }

    /// Returns `true` if the result carries a GraphQL `errors` member.
    pub fn has_errors(&self) -> bool {
        self.result.get("errors").is_some()
    }
}
