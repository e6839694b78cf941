//! Error types for query validation and building.

use std::fmt;
use thiserror::Error;

/// A requested column that failed validation, with close matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidColumn {
    /// The expression exactly as the caller supplied it.
    pub name: String,
    /// Up to three valid column names resembling it.
    pub suggestions: Vec<String>,
}

impl fmt::Display for InvalidColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.suggestions.is_empty() {
            write!(f, "'{}' (no close matches)", self.name)
        } else {
            write!(
                f,
                "'{}' (did you mean: {})",
                self.name,
                self.suggestions.join(", ")
            )
        }
    }
}

/// Errors raised while validating a request or assembling its SQL.
///
/// None of these are fatal: the tool surface renders them as text for the
/// assistant and no statement is executed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SqlError {
    /// The view is not on the allow-list.
    #[error("Invalid table name: {table}")]
    InvalidTable { table: String },

    /// One or more requested columns are unknown or unsafe.
    #[error("Invalid columns: {}", join_invalid(.columns))]
    InvalidColumns { columns: Vec<InvalidColumn> },

    /// The filter carries a clause that has its own parameter.
    #[error(
        "The where_clause must not contain {keyword}. Pass it through the {parameter} parameter instead."
    )]
    SmuggledClause { keyword: String, parameter: String },

    /// An expression could not be parsed and the policy rejects it.
    #[error("Could not parse {kind} '{expression}': {reason}")]
    Unparseable {
        kind: &'static str,
        expression: String,
        reason: String,
    },

    /// An expression embeds a subquery or other relation reference.
    #[error("Subqueries are not allowed in {kind} '{expression}'")]
    Subquery {
        kind: &'static str,
        expression: String,
    },
}

impl SqlError {
    /// Name of the error category reported to callers.
    pub fn category(&self) -> &'static str {
        match self {
            SqlError::InvalidTable { .. } => "InvalidTableError",
            SqlError::InvalidColumns { .. } => "InvalidColumnError",
            SqlError::SmuggledClause { .. }
            | SqlError::Unparseable { .. }
            | SqlError::Subquery { .. } => "MalformedRequestError",
        }
    }

    /// Names of the offending columns, if this is a column error.
    pub fn invalid_column_names(&self) -> Vec<&str> {
        match self {
            SqlError::InvalidColumns { columns } => {
                columns.iter().map(|c| c.name.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn join_invalid(columns: &[InvalidColumn]) -> String {
    columns
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
