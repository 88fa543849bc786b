//! Error types raised while building and running client queries

use std::time::Duration;
use thiserror::Error;

/// A client could not turn the resolved predicate into a query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryBuildError {
    #[error("query for table '{0}' has no projection")]
    EmptyProjection(String),

    #[error("query has no table")]
    MissingTable,

    #[error("invalid bin step {step} for column '{column}'")]
    InvalidBinStep { column: String, step: f64 },

    #[error("client is not configured: {0}")]
    NotConfigured(String),
}

/// The tabular store rejected or failed a query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryExecutionError {
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("store rejected query: {0}")]
    Rejected(String),

    #[error("result conversion failed: {0}")]
    Conversion(String),

    #[error("query worker failed: {0}")]
    Worker(String),
}

/// Failure reported to a client for one generation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("query build failed: {0}")]
    Build(#[from] QueryBuildError),

    #[error("query execution failed: {0}")]
    Execution(#[from] QueryExecutionError),
}
