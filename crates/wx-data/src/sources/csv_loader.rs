use std::io::Read;
use csv::ReaderBuilder;
use rusqlite::types::Value;
use tracing::debug;

use crate::config::IngestConfig;
use crate::schema::{infer_column_types, ColumnType};
use crate::IngestionError;

/// A CSV file parsed into typed rows, ready for insertion
#[derive(Debug)]
pub struct ParsedCsv {
    pub columns: Vec<(String, ColumnType)>,
    pub rows: Vec<Vec<Value>>,
}

/// Read every record, infer column types from the leading sample and convert
pub fn parse_csv<R: Read>(reader: R, config: &IngestConfig) -> Result<ParsedCsv, IngestionError> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(config.delimiter_byte()?)
        .has_headers(config.has_headers)
        .from_reader(reader);

    let mut records: Vec<Vec<String>> = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        records.push(record.iter().map(|s| s.to_string()).collect());
    }

    if records.is_empty() {
        return Err(IngestionError::Empty(config.table.clone()));
    }

    let headers: Vec<String> = if config.has_headers {
        csv_reader.headers()?.iter().map(|h| h.trim().to_string()).collect()
    } else {
        (1..=records[0].len()).map(|idx| format!("column_{}", idx)).collect()
    };

    let sample = &records[..records.len().min(config.sample_size.max(1))];
    let detected = infer_column_types(headers.len(), sample, &config.null_config);

    let columns: Vec<(String, ColumnType)> = headers
        .into_iter()
        .zip(detected)
        .map(|(name, detected)| {
            let column_type = config.column_type(&name, detected);
            debug!(column = %name, ?detected, ?column_type, "column type resolved");
            (name, column_type)
        })
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .enumerate()
                .map(|(idx, (_, column_type))| match record.get(idx) {
                    Some(raw) if !config.null_config.is_null(raw) => column_type.to_value(raw),
                    _ => Value::Null,
                })
                .collect()
        })
        .collect();

    Ok(ParsedCsv { columns, rows })
}
