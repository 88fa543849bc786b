//! Filter predicates and their SQL rendering

use std::collections::BTreeSet;
use std::fmt;
use serde::{Serialize, Deserialize};

/// A literal value compared against a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Text(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// A boolean filter over table columns
///
/// Use the constructor functions rather than building `And`/`Or` directly:
/// they flatten nested groups and drop `True` operands so that structurally
/// equal filters compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// No filter
    True,
    Eq { column: String, value: Literal },
    In { column: String, values: Vec<Literal> },
    Between { column: String, low: Literal, high: Literal },
    IsNull { column: String },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Literal>) -> Self {
        Predicate::Eq { column: column.into(), value: value.into() }
    }

    pub fn in_list<I, L>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Literal>,
    {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn between(column: impl Into<String>, low: impl Into<Literal>, high: impl Into<Literal>) -> Self {
        Predicate::Between { column: column.into(), low: low.into(), high: high.into() }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull { column: column.into() }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Predicate::not(Predicate::is_null(column))
    }

    pub fn not(inner: Predicate) -> Self {
        match inner {
            Predicate::Not(p) => *p,
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// Conjunction of the given predicates; empty input is `True`
    pub fn and<I: IntoIterator<Item = Predicate>>(parts: I) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Predicate::True => {}
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Predicate::True,
            1 => flat.remove(0),
            _ => Predicate::And(flat),
        }
    }

    /// Disjunction of the given predicates
    ///
    /// An empty disjunction places no constraint and yields `True`, as does
    /// any disjunction containing `True`.
    pub fn or<I: IntoIterator<Item = Predicate>>(parts: I) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Predicate::True => return Predicate::True,
                Predicate::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Predicate::True,
            1 => flat.remove(0),
            _ => Predicate::Or(flat),
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Predicate::True)
    }

    /// Columns referenced anywhere in this predicate
    pub fn columns(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Predicate::True => {}
            Predicate::Eq { column, .. }
            | Predicate::In { column, .. }
            | Predicate::Between { column, .. }
            | Predicate::IsNull { column } => {
                out.insert(column.clone());
            }
            Predicate::Not(inner) => inner.collect_columns(out),
            Predicate::And(parts) | Predicate::Or(parts) => {
                for part in parts {
                    part.collect_columns(out);
                }
            }
        }
    }

    /// Render as a SQL boolean expression with `?` placeholders
    pub fn write_sql(&self, sql: &mut String, params: &mut Vec<Literal>) {
        match self {
            Predicate::True => sql.push_str("TRUE"),
            Predicate::Eq { column, value: Literal::Null } | Predicate::IsNull { column } => {
                sql.push_str(&quote_ident(column));
                sql.push_str(" IS NULL");
            }
            Predicate::Eq { column, value } => {
                sql.push_str(&quote_ident(column));
                sql.push_str(" = ?");
                params.push(value.clone());
            }
            Predicate::In { values, .. } if values.is_empty() => sql.push_str("FALSE"),
            Predicate::In { column, values } => {
                sql.push_str(&quote_ident(column));
                sql.push_str(" IN (");
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        sql.push_str(", ");
                    }
                    sql.push('?');
                    params.push(value.clone());
                }
                sql.push(')');
            }
            Predicate::Between { column, low, high } => {
                sql.push_str(&quote_ident(column));
                sql.push_str(" BETWEEN ? AND ?");
                params.push(low.clone());
                params.push(high.clone());
            }
            Predicate::Not(inner) => {
                if let Predicate::IsNull { column } = inner.as_ref() {
                    sql.push_str(&quote_ident(column));
                    sql.push_str(" IS NOT NULL");
                } else {
                    sql.push_str("NOT (");
                    inner.write_sql(sql, params);
                    sql.push(')');
                }
            }
            Predicate::And(parts) => write_group(parts, " AND ", sql, params),
            Predicate::Or(parts) => write_group(parts, " OR ", sql, params),
        }
    }

    /// Render as `(sql, params)`
    pub fn to_sql(&self) -> (String, Vec<Literal>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.write_sql(&mut sql, &mut params);
        (sql, params)
    }
}

fn write_group(parts: &[Predicate], separator: &str, sql: &mut String, params: &mut Vec<Literal>) {
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            sql.push_str(separator);
        }
        sql.push('(');
        part.write_sql(sql, params);
        sql.push(')');
    }
}

/// Quote an identifier for SQL, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Human-readable form with literals inlined, for logs
impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, params) = self.to_sql();
        let mut params = params.iter().peekable();
        for ch in sql.chars() {
            match (ch, params.next_if(|_| ch == '?')) {
                (_, Some(param)) => write!(f, "{}", param)?,
                (ch, None) => write!(f, "{}", ch)?,
            }
        }
        Ok(())
    }
}
