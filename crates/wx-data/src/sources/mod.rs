//! Data sources

pub mod csv_loader;
pub mod sqlite_store;

pub use sqlite_store::SqliteStore;
