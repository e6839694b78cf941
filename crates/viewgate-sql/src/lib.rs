//! # viewgate-sql
//!
//! Validation of caller-supplied SQL fragments and assembly of the SELECT
//! statements viewgate is willing to run.
//!
//! - [`ExpressionValidator`]: parses column, filter and ordering fragments
//!   and checks their column references.
//! - [`QueryBuilder`]: turns validated requests into single-view or joined
//!   queries against allow-listed views.

pub mod builder;
pub mod error;
pub mod expression;
pub mod filter;
pub mod suggest;

pub use builder::{
    BuiltQuery, JoinDescriptor, JoinPlan, JoinedViewRequest, QueryBuilder, SingleViewRequest,
    alias_for,
};
pub use error::{InvalidColumn, SqlError};
pub use expression::{ColumnRef, ExpressionKind, ExpressionValidator, ParseOutcome, ParsedExpression};
pub use filter::{check_reserved_clauses, parse_filter_assignments, unwrap_quoted};
pub use suggest::close_matches;
