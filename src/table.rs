//! Tabular row model shared by the reader and the format writers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single parsed cell value.
///
/// Cells are typed eagerly at parse time; writers that need a uniform column
/// type unify cell kinds per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    /// Empty field.
    Null,
    /// Boolean literal (`true`/`false`, case-insensitive).
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Anything else, kept verbatim.
    Text(String),
}

impl Cell {
    /// Parse a raw field into the narrowest matching cell kind.
    pub fn parse(field: &str) -> Cell {
        if field.is_empty() {
            return Cell::Null;
        }
        if field.eq_ignore_ascii_case("true") {
            return Cell::Bool(true);
        }
        if field.eq_ignore_ascii_case("false") {
            return Cell::Bool(false);
        }
        if let Ok(i) = field.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = field.parse::<f64>() {
            return Cell::Float(f);
        }
        Cell::Text(field.to_string())
    }

    /// Render the cell as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Null => serde_json::Value::Null,
            Cell::Bool(b) => serde_json::Value::Bool(*b),
            Cell::Int(i) => serde_json::Value::from(*i),
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Cell::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => write!(f, "{s}"),
        }
    }
}

/// An ordered sequence of parsed rows with named columns.
///
/// Represents either the whole file (single-pass mode) or one bounded-size
/// slice (chunk mode). Owned exclusively by the stage currently processing
/// it; dropped before the next chunk is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowBatch {
    /// Column names, taken from the header row.
    pub columns: Vec<String>,
    /// Row data; every row has `columns.len()` cells.
    pub rows: Vec<Vec<Cell>>,
}

impl RowBatch {
    /// Create an empty batch with the given column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Number of data rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Whether the batch holds no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
