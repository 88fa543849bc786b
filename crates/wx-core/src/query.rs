//! Query specifications, requests and results

use std::collections::BTreeSet;
use std::fmt::Write as _;
use arrow::record_batch::RecordBatch;
use serde::{Serialize, Deserialize};

use crate::client::ClientId;
use crate::error::QueryBuildError;
use crate::predicate::{quote_ident, Literal, Predicate};

/// Aggregate functions available to projections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    fn sql_name(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        }
    }
}

/// One output column of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// A plain column, optionally renamed
    Column { column: String, alias: Option<String> },
    /// `COUNT(*)`
    CountAll { alias: String },
    /// An aggregate over one column
    Aggregate { func: AggregateFunc, column: String, alias: String },
    /// Lower edge of the fixed-width bin the column value falls in
    Bin { column: String, step: f64, alias: String },
}

impl Projection {
    pub fn column(column: impl Into<String>) -> Self {
        Projection::Column { column: column.into(), alias: None }
    }

    pub fn count_all(alias: impl Into<String>) -> Self {
        Projection::CountAll { alias: alias.into() }
    }

    pub fn aggregate(func: AggregateFunc, column: impl Into<String>, alias: impl Into<String>) -> Self {
        Projection::Aggregate { func, column: column.into(), alias: alias.into() }
    }

    pub fn bin(column: impl Into<String>, step: f64, alias: impl Into<String>) -> Self {
        Projection::Bin { column: column.into(), step, alias: alias.into() }
    }

    /// Name of the field this projection produces
    pub fn output_name(&self) -> &str {
        match self {
            Projection::Column { column, alias } => alias.as_deref().unwrap_or(column),
            Projection::CountAll { alias }
            | Projection::Aggregate { alias, .. }
            | Projection::Bin { alias, .. } => alias,
        }
    }

    fn write_sql(&self, sql: &mut String) {
        match self {
            Projection::Column { column, alias } => {
                sql.push_str(&quote_ident(column));
                if let Some(alias) = alias {
                    let _ = write!(sql, " AS {}", quote_ident(alias));
                }
            }
            Projection::CountAll { alias } => {
                let _ = write!(sql, "COUNT(*) AS {}", quote_ident(alias));
            }
            Projection::Aggregate { func, column, alias } => {
                let _ = write!(sql, "{}({}) AS {}", func.sql_name(), quote_ident(column), quote_ident(alias));
            }
            Projection::Bin { column, step, alias } => {
                // floor(x / step) * step without relying on math extensions
                let ratio = format!("({} / {:?})", quote_ident(column), step);
                let _ = write!(
                    sql,
                    "((CAST({r} AS INTEGER) - ({r} < CAST({r} AS INTEGER))) * {s:?}) AS {a}",
                    r = ratio,
                    s = step,
                    a = quote_ident(alias),
                );
            }
        }
    }
}

/// Sort key referring to an output name or table column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub name: String,
    pub descending: bool,
}

/// A rendered SQL statement with positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Literal>,
}

impl SqlQuery {
    /// Key identifying identical statements, used for deduplication and caching
    pub fn cache_key(&self) -> String {
        let mut key = self.sql.clone();
        for param in &self.params {
            let _ = write!(key, "\u{1f}{:?}", param);
        }
        key
    }
}

/// Description of a query against one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub table: String,
    pub projection: Vec<Projection>,
    pub filter: Predicate,
    pub group_by: Vec<String>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub distinct: bool,
}

impl QuerySpec {
    /// Start a query over the given table
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            projection: Vec::new(),
            filter: Predicate::True,
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            distinct: false,
        }
    }

    pub fn select(mut self, projection: Projection) -> Self {
        self.projection.push(projection);
        self
    }

    /// Add a filter, conjoined with any filter already present
    pub fn filter(mut self, predicate: Predicate) -> Self {
        let current = std::mem::replace(&mut self.filter, Predicate::True);
        self.filter = Predicate::and(vec![current, predicate]);
        self
    }

    pub fn group_by(mut self, name: impl Into<String>) -> Self {
        self.group_by.push(name.into());
        self
    }

    pub fn order_by(mut self, name: impl Into<String>, descending: bool) -> Self {
        self.order_by.push(OrderBy { name: name.into(), descending });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Table columns the query reads, in the projection and the filter
    pub fn columns(&self) -> BTreeSet<String> {
        let mut columns = self.filter.columns();
        for projection in &self.projection {
            match projection {
                Projection::Column { column, .. }
                | Projection::Aggregate { column, .. }
                | Projection::Bin { column, .. } => {
                    columns.insert(column.clone());
                }
                Projection::CountAll { .. } => {}
            }
        }
        columns
    }

    /// Check the structural requirements the store relies on
    pub fn validate(&self) -> Result<(), QueryBuildError> {
        if self.table.is_empty() {
            return Err(QueryBuildError::MissingTable);
        }
        if self.projection.is_empty() {
            return Err(QueryBuildError::EmptyProjection(self.table.clone()));
        }
        for projection in &self.projection {
            if let Projection::Bin { column, step, .. } = projection {
                if !step.is_finite() || *step <= 0.0 {
                    return Err(QueryBuildError::InvalidBinStep {
                        column: column.clone(),
                        step: *step,
                    });
                }
            }
        }
        Ok(())
    }

    /// Render to a parameterized SQL statement
    pub fn to_sql(&self) -> SqlQuery {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        for (idx, projection) in self.projection.iter().enumerate() {
            if idx > 0 {
                sql.push_str(", ");
            }
            projection.write_sql(&mut sql);
        }

        let _ = write!(sql, " FROM {}", quote_ident(&self.table));

        if !self.filter.is_true() {
            sql.push_str(" WHERE ");
            self.filter.write_sql(&mut sql, &mut params);
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            let names: Vec<String> = self.group_by.iter().map(|g| quote_ident(g)).collect();
            sql.push_str(&names.join(", "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let keys: Vec<String> = self
                .order_by
                .iter()
                .map(|o| format!("{}{}", quote_ident(&o.name), if o.descending { " DESC" } else { "" }))
                .collect();
            sql.push_str(&keys.join(", "));
        }

        if let Some(limit) = self.limit {
            let _ = write!(sql, " LIMIT {}", limit);
        }

        SqlQuery { sql, params }
    }
}

/// A query issued on behalf of one client; immutable once issued
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub client_id: ClientId,
    pub predicate_snapshot: Predicate,
    pub generation: u64,
    pub spec: QuerySpec,
}

/// Rows answering the query issued at `generation`
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub generation: u64,
    pub batch: RecordBatch,
}
