//! Typed access to result columns

use arrow::array::{Array, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use thiserror::Error;

/// A result batch did not have the shape a widget expects
#[derive(Error, Debug)]
pub enum ColumnError {
    #[error("result has no column '{0}'")]
    Missing(String),

    #[error("column '{column}' cannot be read as {target}: {source}")]
    Cast {
        column: String,
        target: DataType,
        #[source]
        source: ArrowError,
    },
}

fn cast_column(batch: &RecordBatch, name: &str, target: DataType) -> Result<arrow::array::ArrayRef, ColumnError> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| ColumnError::Missing(name.to_string()))?;
    cast(column, &target).map_err(|source| ColumnError::Cast {
        column: name.to_string(),
        target,
        source,
    })
}

/// Read a column as floats; integers widen, nulls stay `None`
pub fn f64_values(batch: &RecordBatch, name: &str) -> Result<Vec<Option<f64>>, ColumnError> {
    let array = cast_column(batch, name, DataType::Float64)?;
    let array = array.as_any().downcast_ref::<Float64Array>().ok_or_else(|| ColumnError::Missing(name.to_string()))?;
    Ok(array.iter().collect())
}

/// Read a column as text
pub fn text_values(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>, ColumnError> {
    let array = cast_column(batch, name, DataType::Utf8)?;
    let array = array.as_any().downcast_ref::<StringArray>().ok_or_else(|| ColumnError::Missing(name.to_string()))?;
    Ok(array.iter().map(|v| v.map(str::to_string)).collect())
}
