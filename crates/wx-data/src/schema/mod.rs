//! Column type inference and table metadata

use chrono::NaiveDate;
use rayon::prelude::*;
use rusqlite::types::Value;
use serde::{Serialize, Deserialize};

use crate::config::NullConfig;

/// Date layouts accepted in CSV input; stored as ISO `YYYY-MM-DD`
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Storage type of a loaded column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Real,
    /// Calendar date, stored as ISO text
    Date,
    Text,
}

impl ColumnType {
    /// SQLite column declaration
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Date | ColumnType::Text => "TEXT",
        }
    }

    /// Convert one non-null cell for storage
    ///
    /// Cells that do not parse as the column type are stored as text; SQLite
    /// keeps them without coercion.
    pub fn to_value(&self, raw: &str) -> Value {
        let trimmed = raw.trim();
        match self {
            ColumnType::Integer => trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            ColumnType::Real => trimmed
                .parse::<f64>()
                .map(Value::Real)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            ColumnType::Date => match parse_date(trimmed) {
                Some(date) => Value::Text(date.format("%Y-%m-%d").to_string()),
                None => Value::Text(raw.to_string()),
            },
            ColumnType::Text => Value::Text(raw.to_string()),
        }
    }
}

/// Parse a date in any accepted layout
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Infer the narrowest type that holds every non-null sample of a column
///
/// All-null columns are typed `Text`.
pub fn infer_column<'a, I>(values: I, null_config: &NullConfig) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut is_int = true;
    let mut is_float = true;
    let mut is_date = true;
    let mut seen = false;

    for value in values {
        if null_config.is_null(value) {
            continue;
        }
        seen = true;
        let value = value.trim();

        if is_int && value.parse::<i64>().is_err() {
            is_int = false;
        }
        if is_float && value.parse::<f64>().is_err() {
            is_float = false;
        }
        if is_date && parse_date(value).is_none() {
            is_date = false;
        }
        if !is_int && !is_float && !is_date {
            break;
        }
    }

    if !seen {
        ColumnType::Text
    } else if is_int {
        ColumnType::Integer
    } else if is_float {
        ColumnType::Real
    } else if is_date {
        ColumnType::Date
    } else {
        ColumnType::Text
    }
}

/// Infer every column of a sample, one rayon task per column
pub fn infer_column_types(column_count: usize, samples: &[Vec<String>], null_config: &NullConfig) -> Vec<ColumnType> {
    (0..column_count)
        .into_par_iter()
        .map(|idx| {
            infer_column(
                samples.iter().map(|row| row.get(idx).map(String::as_str).unwrap_or("")),
                null_config,
            )
        })
        .collect()
}

/// A loaded table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<(String, ColumnType)>,
    pub row_count: usize,
}

impl TableInfo {
    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, column_type)| *column_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_weather_columns() {
        let nulls = NullConfig::default();
        assert_eq!(infer_column(["2012-01-01", "2012-01-02"], &nulls), ColumnType::Date);
        assert_eq!(infer_column(["0.0", "10.9", ""], &nulls), ColumnType::Real);
        assert_eq!(infer_column(["12", "-3", "NA"], &nulls), ColumnType::Integer);
        assert_eq!(infer_column(["drizzle", "rain"], &nulls), ColumnType::Text);
        assert_eq!(infer_column(["", " "], &nulls), ColumnType::Text);
    }

    #[test]
    fn test_mixed_values_fall_back_to_text() {
        let nulls = NullConfig::default();
        assert_eq!(infer_column(["1.5", "2012-01-01"], &nulls), ColumnType::Text);
        assert_eq!(infer_column(["1", "2.5"], &nulls), ColumnType::Real);
    }

    #[test]
    fn test_infer_column_types_per_column() {
        let samples = vec![
            vec!["2012-01-01".to_string(), "0.0".to_string(), "drizzle".to_string()],
            vec!["2012-01-02".to_string(), "10.9".to_string()],
        ];
        let types = infer_column_types(3, &samples, &NullConfig::default());
        assert_eq!(types, vec![ColumnType::Date, ColumnType::Real, ColumnType::Text]);
    }

    #[test]
    fn test_dates_normalized_to_iso() {
        assert_eq!(ColumnType::Date.to_value("01/31/2012"), Value::Text("2012-01-31".to_string()));
        assert_eq!(ColumnType::Date.to_value("2012/1/5"), Value::Text("2012-01-05".to_string()));
        assert_eq!(ColumnType::Real.to_value(" 4.7 "), Value::Real(4.7));
        assert_eq!(ColumnType::Integer.to_value("x"), Value::Text("x".to_string()));
    }

    #[test]
    fn test_column_lookup() {
        let info = TableInfo {
            name: "weather".to_string(),
            columns: vec![
                ("date".to_string(), ColumnType::Date),
                ("wind".to_string(), ColumnType::Real),
            ],
            row_count: 2,
        };
        assert_eq!(info.column_type("wind"), Some(ColumnType::Real));
        assert_eq!(info.column_type("missing"), None);
    }
}
