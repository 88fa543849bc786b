//! Client capability implemented by query-bound widgets

use uuid::Uuid;

use crate::error::{ClientError, QueryBuildError};
use crate::predicate::Predicate;
use crate::query::{QueryResult, QuerySpec};

/// Client identifier type
pub type ClientId = Uuid;

/// Trait for widgets that query the store and consume results
pub trait Client: Send {
    /// Get the display name used in logs
    fn name(&self) -> &str;

    /// Source id of the clause this client produces, if it produces one
    fn source(&self) -> Option<&str> {
        None
    }

    /// Whether the client's own clause is left out of its filter
    fn self_exclusion(&self) -> bool {
        false
    }

    /// Build the query for the given resolved filter
    ///
    /// Must be deterministic for a given filter and client configuration.
    fn build_query(&self, filter: &Predicate) -> Result<QuerySpec, QueryBuildError>;

    /// Consume the result of the client's current query
    fn on_result(&mut self, result: &QueryResult);

    /// Called when the current generation failed; the last good output stays
    fn on_error(&mut self, _error: &ClientError) {}
}

/// Per-client scheduling state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    QueryPending { generation: u64 },
    ApplyingResult { generation: u64 },
    /// The pending query was overtaken by a newer selection version
    Superseded { generation: u64 },
}
