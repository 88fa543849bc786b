//! SQLite tabular store

use std::fs::File;
use std::io::{BufReader, Read};
use std::sync::Arc;
use async_trait::async_trait;
use ahash::AHashMap;
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parking_lot::{Mutex, RwLock};
use rusqlite::{config::DbConfig, params_from_iter, types::Value, Connection};
use tracing::{debug, info};
use wx_core::predicate::quote_ident;
use wx_core::{Literal, QueryExecutionError, QuerySpec, SqlQuery, TabularStore};

use super::csv_loader::parse_csv;
use crate::config::IngestConfig;
use crate::schema::TableInfo;
use crate::IngestionError;

/// In-memory SQLite database holding the loaded dataset
///
/// Cloning is cheap; clones share the connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    tables: Arc<RwLock<AHashMap<String, TableInfo>>>,
}

impl SqliteStore {
    pub fn open_in_memory() -> Result<Self, IngestionError> {
        let conn = Connection::open_in_memory()?;
        // "name" is always an identifier, never a string literal
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DML, false)?;
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DDL, false)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            tables: Arc::new(RwLock::new(AHashMap::new())),
        })
    }

    /// Load the configured CSV file into its table
    pub async fn load_csv(&self, config: &IngestConfig) -> Result<TableInfo, IngestionError> {
        tokio::task::spawn_blocking({
            let store = self.clone();
            let config = config.clone();
            move || {
                let file = File::open(&config.path).map_err(|source| IngestionError::Io {
                    path: config.path.clone(),
                    source,
                })?;
                store.load_csv_reader(BufReader::new(file), &config)
            }
        })
        .await?
    }

    /// Load CSV text from any reader into the configured table
    pub fn load_csv_reader<R: Read>(&self, reader: R, config: &IngestConfig) -> Result<TableInfo, IngestionError> {
        let parsed = parse_csv(reader, config)?;
        let table = quote_ident(&config.table);

        let columns_sql: Vec<String> = parsed
            .columns
            .iter()
            .map(|(name, column_type)| format!("{} {}", quote_ident(name), column_type.sql_type()))
            .collect();
        let placeholders = vec!["?"; parsed.columns.len()].join(", ");

        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            tx.execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;
            tx.execute(&format!("CREATE TABLE {} ({})", table, columns_sql.join(", ")), [])?;
            {
                let mut insert = tx.prepare(&format!("INSERT INTO {} VALUES ({})", table, placeholders))?;
                for row in &parsed.rows {
                    insert.execute(params_from_iter(row.iter()))?;
                }
            }
            tx.commit()?;
        }

        let info = TableInfo {
            name: config.table.clone(),
            columns: parsed.columns,
            row_count: parsed.rows.len(),
        };

        info!(
            table = %info.name,
            source = %config.file_name(),
            rows = info.row_count,
            columns = info.columns.len(),
            "dataset loaded"
        );

        self.tables.write().insert(info.name.clone(), info.clone());
        Ok(info)
    }

    pub fn table(&self, name: &str) -> Option<TableInfo> {
        self.tables.read().get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Reject queries over unknown tables or columns before they reach SQLite
    pub fn check_columns(&self, spec: &QuerySpec) -> Result<(), QueryExecutionError> {
        let tables = self.tables.read();
        let info = tables
            .get(&spec.table)
            .ok_or_else(|| QueryExecutionError::Rejected(format!("no such table: {}", spec.table)))?;

        match spec.columns().into_iter().find(|column| info.column_type(column).is_none()) {
            Some(column) => Err(QueryExecutionError::Rejected(format!(
                "no such column: {} in {}",
                column, spec.table
            ))),
            None => Ok(()),
        }
    }

    /// Run a rendered statement on the calling thread
    pub fn query(&self, query: &SqlQuery) -> Result<RecordBatch, QueryExecutionError> {
        let conn = self.conn.lock();
        let rejected = |e: rusqlite::Error| QueryExecutionError::Rejected(e.to_string());

        let mut stmt = conn.prepare(&query.sql).map_err(rejected)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let params: Vec<Value> = query.params.iter().map(literal_value).collect();

        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
        let mut rows = stmt.query(params_from_iter(params.iter())).map_err(rejected)?;
        while let Some(row) = rows.next().map_err(rejected)? {
            for (idx, column) in columns.iter_mut().enumerate() {
                column.push(row.get::<_, Value>(idx).map_err(rejected)?);
            }
        }

        debug!(sql = %query.sql, rows = columns.first().map_or(0, Vec::len), "query executed");
        build_batch(names, columns)
    }
}

#[async_trait]
impl TabularStore for SqliteStore {
    async fn execute(&self, spec: &QuerySpec) -> Result<RecordBatch, QueryExecutionError> {
        self.check_columns(spec)?;
        let query = spec.to_sql();
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.query(&query))
            .await
            .map_err(|e| QueryExecutionError::Worker(e.to_string()))?
    }

    fn store_name(&self) -> &str {
        "sqlite"
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Integer(i64::from(*b)),
        Literal::Int(i) => Value::Integer(*i),
        Literal::Float(f) => Value::Real(*f),
        Literal::Text(s) => Value::Text(s.clone()),
    }
}

/// Pick the arrow type for a result column from the values SQLite returned
///
/// Any text makes the column `Utf8`; otherwise any real makes it `Float64`.
/// Integer-only columns are `Int64` and all-null columns `Float64`.
fn result_type(values: &[Value]) -> DataType {
    let mut has_int = false;
    let mut has_real = false;
    for value in values {
        match value {
            Value::Text(_) | Value::Blob(_) => return DataType::Utf8,
            Value::Real(_) => has_real = true,
            Value::Integer(_) => has_int = true,
            Value::Null => {}
        }
    }
    if has_int && !has_real {
        DataType::Int64
    } else {
        DataType::Float64
    }
}

fn build_batch(names: Vec<String>, columns: Vec<Vec<Value>>) -> Result<RecordBatch, QueryExecutionError> {
    let mut fields = Vec::with_capacity(names.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(names.len());

    for (name, values) in names.into_iter().zip(columns) {
        let data_type = result_type(&values);
        let array: ArrayRef = match data_type {
            DataType::Int64 => Arc::new(Int64Array::from_iter(values.iter().map(|v| match v {
                Value::Integer(i) => Some(*i),
                _ => None,
            }))),
            DataType::Float64 => Arc::new(Float64Array::from_iter(values.iter().map(|v| match v {
                Value::Integer(i) => Some(*i as f64),
                Value::Real(f) => Some(*f),
                _ => None,
            }))),
            _ => Arc::new(StringArray::from_iter(values.iter().map(|v| match v {
                Value::Text(s) => Some(s.clone()),
                Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
                Value::Integer(i) => Some(i.to_string()),
                Value::Real(f) => Some(f.to_string()),
                Value::Null => None,
            }))),
        };
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .map_err(|e| QueryExecutionError::Conversion(e.to_string()))
}
