//! Error types for statement execution and schema lookup.

use thiserror::Error;

/// Errors raised by executors and the schema registry.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("invalid warehouse configuration: {0}")]
    Config(String),

    #[error("warehouse request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("warehouse returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The statement reached a terminal state other than success.
    #[error("statement {state}: {message}")]
    Statement { state: String, message: String },

    #[error("unexpected warehouse response: {0}")]
    Decode(String),

    #[error("{view} is not an allow-listed view")]
    UnknownView { view: String },

    /// Neither the metadata table nor the fallback describe produced columns.
    #[error("could not fetch columns for {view}: {reason}")]
    SchemaFetch { view: String, reason: String },
}
