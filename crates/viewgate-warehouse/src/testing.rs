//! Scripted in-memory executor for tests.
//!
//! Rules match on a substring of the SQL text; the first matching rule wins
//! and may match any number of times. Unmatched statements return an empty
//! result set. Every statement is recorded.

use crate::error::WarehouseError;
use crate::executor::{ResultSet, Statement, StatementExecutor};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone)]
enum Reply {
    Rows(ResultSet),
    Fail(String),
}

/// Executor that answers from a script instead of a warehouse.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    rules: Vec<(String, Reply)>,
    calls: Mutex<Vec<Statement>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements containing `needle` with `rows`.
    pub fn on(mut self, needle: impl Into<String>, rows: ResultSet) -> Self {
        self.rules.push((needle.into(), Reply::Rows(rows)));
        self
    }

    /// Fail statements containing `needle` with `message`.
    pub fn fail_on(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Reply::Fail(message.into())));
        self
    }

    /// Every statement executed so far, in order.
    pub fn calls(&self) -> Vec<Statement> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of executed statements containing `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.sql.contains(needle))
            .count()
    }
}

#[async_trait]
impl StatementExecutor for ScriptedExecutor {
    async fn execute(&self, statement: &Statement) -> Result<ResultSet, WarehouseError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(statement.clone());

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| statement.sql.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Fail(message)) => Err(WarehouseError::Statement {
                state: "FAILED".to_string(),
                message,
            }),
            None => Ok(ResultSet::default()),
        }
    }
}
