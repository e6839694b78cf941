//! Per-session rolling query context.
//!
//! A session is created on first reference to its id and lives until the
//! process exits. Each holds a bounded history of executed queries and joins,
//! the tables, columns and filter values recently used, and a scratch map
//! that caches per-view column lists.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use viewgate_sql::{BuiltQuery, JoinDescriptor};

/// One executed query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryLogEntry {
    pub tool: String,
    pub tables: Vec<String>,
    pub columns: Vec<String>,
    pub filters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinDescriptor>,
    pub sql: String,
    pub timestamp: DateTime<Utc>,
}

impl QueryLogEntry {
    pub fn from_built(tool: impl Into<String>, built: &BuiltQuery) -> Self {
        Self {
            tool: tool.into(),
            tables: built.tables.clone(),
            columns: built.columns.clone(),
            filters: built.filters.clone(),
            join: built.join.clone(),
            sql: built.sql.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Mutable state of a single session.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub recent_queries: VecDeque<QueryLogEntry>,
    pub recent_tables: BTreeSet<String>,
    pub recent_columns: BTreeSet<String>,
    /// Last value seen per filter column.
    pub filter_history: BTreeMap<String, String>,
    pub join_history: VecDeque<JoinDescriptor>,
    scratch: HashMap<String, Value>,
}

impl SessionContext {
    fn record(&mut self, entry: QueryLogEntry, limit: usize) {
        self.recent_tables.extend(entry.tables.iter().cloned());
        self.recent_columns.extend(entry.columns.iter().cloned());
        self.filter_history
            .extend(entry.filters.iter().map(|(k, v)| (k.clone(), v.clone())));

        if let Some(join) = &entry.join {
            self.join_history.push_back(join.clone());
            while self.join_history.len() > limit {
                self.join_history.pop_front();
            }
        }

        self.recent_queries.push_back(entry);
        while self.recent_queries.len() > limit {
            self.recent_queries.pop_front();
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.scratch.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.scratch.insert(key.into(), value);
    }
}

/// Snapshot returned by `fetch_recent_query_context`.
#[derive(Debug, Clone, Serialize)]
pub struct RelevantContext {
    pub recent_tables: Vec<String>,
    pub recent_columns: Vec<String>,
    pub filter_history: BTreeMap<String, String>,
    pub relevant_joins: Vec<JoinDescriptor>,
    pub recent_queries: Vec<QueryLogEntry>,
}

fn columns_key(view: &str) -> String {
    format!("columns:{view}")
}

/// Session-keyed store shared by every call path.
#[derive(Debug)]
pub struct SessionStore {
    history_limit: usize,
    sessions: RwLock<HashMap<String, SessionContext>>,
}

impl SessionStore {
    pub fn new(history_limit: usize) -> Self {
        Self {
            history_limit: history_limit.max(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    fn with_session<R>(&self, session_id: &str, f: impl FnOnce(&mut SessionContext) -> R) -> R {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        f(sessions.entry(session_id.to_string()).or_default())
    }

    /// Snapshot of a session, creating it empty on first access.
    pub fn get_or_create(&self, session_id: &str) -> SessionContext {
        self.with_session(session_id, |session| session.clone())
    }

    /// Append a query, evicting the oldest beyond the history limit.
    pub fn record_query(&self, session_id: &str, entry: QueryLogEntry) {
        let limit = self.history_limit;
        self.with_session(session_id, |session| session.record(entry, limit));
    }

    /// Remember a view's columns for this session only.
    pub fn cache_columns_for_session(&self, session_id: &str, view: &str, columns: &BTreeSet<String>) {
        let value = Value::from(columns.iter().cloned().collect::<Vec<_>>());
        self.with_session(session_id, |session| session.set(columns_key(view), value));
    }

    pub fn get_cached_columns(&self, session_id: &str, view: &str) -> Option<BTreeSet<String>> {
        self.with_session(session_id, |session| {
            let cached = session.get(&columns_key(view))?.as_array()?;
            Some(
                cached
                    .iter()
                    .filter_map(|c| c.as_str().map(str::to_string))
                    .collect(),
            )
        })
    }

    /// Recent tables, columns, filters and joins plus the last `max_queries` queries.
    pub fn relevant_context(&self, session_id: &str, max_queries: usize) -> RelevantContext {
        self.with_session(session_id, |session| {
            let skip = session.recent_queries.len().saturating_sub(max_queries);
            RelevantContext {
                recent_tables: session.recent_tables.iter().cloned().collect(),
                recent_columns: session.recent_columns.iter().cloned().collect(),
                filter_history: session.filter_history.clone(),
                relevant_joins: session.join_history.iter().cloned().collect(),
                recent_queries: session.recent_queries.iter().skip(skip).cloned().collect(),
            }
        })
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
