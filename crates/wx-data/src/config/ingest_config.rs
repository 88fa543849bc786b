//! CSV ingestion configuration

use std::collections::HashMap;
use std::path::PathBuf;
use serde::{Serialize, Deserialize};

use super::null_handling::NullConfig;
use crate::schema::ColumnType;
use crate::IngestionError;

/// How one CSV file is loaded into a store table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Path to the CSV file
    pub path: PathBuf,

    /// Table the rows are loaded into; replaced if it exists
    pub table: String,

    pub delimiter: char,

    /// Without headers, columns are named `column_1`, `column_2`, ...
    pub has_headers: bool,

    /// Rows inspected for type inference
    pub sample_size: usize,

    /// Column type overrides
    pub column_types: HashMap<String, ColumnType>,

    /// Null handling configuration
    pub null_config: NullConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/seattle-weather.csv"),
            table: "weather".to_string(),
            delimiter: ',',
            has_headers: true,
            sample_size: 1000,
            column_types: HashMap::new(),
            null_config: NullConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Create a configuration loading `path` into `table`
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_column_type(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.column_types.insert(column.into(), column_type);
        self
    }

    /// Get column type with override
    pub fn column_type(&self, column: &str, detected: ColumnType) -> ColumnType {
        self.column_types.get(column).copied().unwrap_or(detected)
    }

    /// The delimiter as the single byte the CSV reader expects
    pub fn delimiter_byte(&self) -> Result<u8, IngestionError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(IngestionError::InvalidDelimiter(self.delimiter))
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}
