//! Tabular store boundary

use arrow::record_batch::RecordBatch;

use crate::error::QueryExecutionError;
use crate::query::QuerySpec;

/// Trait for stores that answer filter/aggregate queries
///
/// Results are column-oriented; field names match the output names of the
/// query's projection.
#[async_trait::async_trait]
pub trait TabularStore: Send + Sync {
    /// Execute a query and return its rows
    async fn execute(&self, spec: &QuerySpec) -> Result<RecordBatch, QueryExecutionError>;

    /// Get the store name for logs
    fn store_name(&self) -> &str;
}
