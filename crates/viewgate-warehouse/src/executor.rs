//! The statement execution seam.

use crate::error::WarehouseError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// A named parameter bound into a statement as `:name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementParameter {
    pub name: String,
    pub value: String,
}

/// SQL text plus its bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub parameters: Vec<StatementParameter>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    /// Bind `value` to the `:name` marker.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(StatementParameter {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// Rows returned by a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Position of a column, compared case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// One line per row, `(v1, v2, ...)`, or `No results found.`.
    pub fn format_rows(&self) -> String {
        if self.rows.is_empty() {
            return "No results found.".to_string();
        }
        self.rows
            .iter()
            .map(|row| {
                let values: Vec<String> = row.iter().map(format_value).collect();
                format!("({})", values.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "\\'")),
        other => other.to_string(),
    }
}

/// Runs SQL against the warehouse.
///
/// Implementations report failures once; callers do not retry.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn execute(&self, statement: &Statement) -> Result<ResultSet, WarehouseError>;
}
