//! Core functionality for the cross-filtering dashboard
//!
//! This crate provides the reactive engine: shared selections made of
//! per-source clauses, the client capability that widgets implement, and
//! the coordinator that turns selection changes into store queries.

pub mod client;
pub mod coordinator;
pub mod error;
pub mod predicate;
pub mod query;
pub mod selection;
pub mod store;

// Re-export commonly used types
pub use client::{Client, ClientId, ClientState};
pub use coordinator::{ClientStats, Coordinator, CoordinatorConfig, CoordinatorStats};
pub use error::{ClientError, QueryBuildError, QueryExecutionError};
pub use predicate::{Literal, Predicate};
pub use query::{AggregateFunc, Projection, QueryRequest, QueryResult, QuerySpec, SqlQuery};
pub use selection::{Clause, CombineMode, Selection, SelectionId, SelectionSubscriber, SourceId};
pub use store::TabularStore;
