//! Dataset ingestion and the SQLite-backed tabular store

pub mod config;
pub mod schema;
pub mod sources;

use std::path::PathBuf;
use tokio::task::JoinError;
use thiserror::Error;

// Re-exports
pub use config::{IngestConfig, NullConfig};
pub use schema::{ColumnType, TableInfo};
pub use sources::SqliteStore;

/// Errors that can occur while loading a dataset
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("dataset for table '{0}' contains no data rows")]
    Empty(String),

    #[error("invalid delimiter {0:?}: must be a single ASCII character")]
    InvalidDelimiter(char),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),
}
