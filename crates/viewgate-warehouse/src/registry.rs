//! Schema registry: the allow-list plus lazily fetched column metadata.
//!
//! Column metadata is read from the catalog's metadata table the first time a
//! view is needed and kept for the life of the process. Views the metadata
//! table does not describe fall back to `DESCRIBE TABLE`.

use crate::error::WarehouseError;
use crate::executor::{ResultSet, Statement, StatementExecutor};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};
use viewgate_core::ViewCatalog;

/// Description of one column of a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMetadata {
    pub column_name: String,
    pub description: String,
    pub data_type: Option<String>,
    pub notes: Option<String>,
    pub example_value: Option<String>,
}

/// Allow-list and per-view column cache.
///
/// Concurrent first lookups of the same view may each query the warehouse;
/// the last one to finish wins.
pub struct SchemaRegistry {
    catalog: Arc<ViewCatalog>,
    executor: Arc<dyn StatementExecutor>,
    cache: RwLock<HashMap<String, Arc<Vec<ColumnMetadata>>>>,
}

impl SchemaRegistry {
    pub fn new(catalog: Arc<ViewCatalog>, executor: Arc<dyn StatementExecutor>) -> Self {
        Self {
            catalog,
            executor,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &ViewCatalog {
        &self.catalog
    }

    /// The static allow-list. No I/O.
    pub fn list_allowed_views(&self) -> BTreeSet<String> {
        self.catalog.allowed_views().clone()
    }

    /// Cached metadata for `view`, if it has been fetched.
    pub fn cached(&self, view: &str) -> Option<Arc<Vec<ColumnMetadata>>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(view)
            .cloned()
    }

    /// Valid column names for `view`.
    pub async fn columns_for(&self, view: &str) -> Result<BTreeSet<String>, WarehouseError> {
        let metadata = self.describe(view).await?;
        Ok(metadata.iter().map(|c| c.column_name.clone()).collect())
    }

    /// Full column metadata for `view`, fetched once and cached.
    pub async fn describe(&self, view: &str) -> Result<Arc<Vec<ColumnMetadata>>, WarehouseError> {
        if !self.catalog.is_allowed(view) {
            return Err(WarehouseError::UnknownView {
                view: view.to_string(),
            });
        }
        if let Some(cached) = self.cached(view) {
            debug!(view, "Column metadata served from cache");
            return Ok(cached);
        }

        let columns = Arc::new(self.fetch(view).await?);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(view.to_string(), Arc::clone(&columns));
        Ok(columns)
    }

    async fn fetch(&self, view: &str) -> Result<Vec<ColumnMetadata>, WarehouseError> {
        let metadata_error = match self.executor.execute(&self.metadata_statement(view)).await {
            Ok(rows) if !rows.is_empty() => {
                let columns = metadata_rows(&rows);
                info!(view, columns = columns.len(), "Loaded column metadata");
                return Ok(columns);
            }
            Ok(_) => {
                warn!(view, "No column metadata found, falling back to DESCRIBE TABLE");
                None
            }
            Err(e) => {
                warn!(view, error = %e, "Metadata query failed, falling back to DESCRIBE TABLE");
                Some(e.to_string())
            }
        };

        let describe = Statement::new(format!("DESCRIBE TABLE {}", self.catalog.qualify(view)));
        let reason = match self.executor.execute(&describe).await {
            Ok(rows) => {
                let columns = describe_rows(&rows);
                if !columns.is_empty() {
                    info!(view, columns = columns.len(), "Loaded columns from DESCRIBE TABLE");
                    return Ok(columns);
                }
                "no columns found".to_string()
            }
            Err(e) => e.to_string(),
        };

        let reason = match metadata_error {
            Some(first) => format!("metadata query failed ({first}); describe failed ({reason})"),
            None => reason,
        };
        Err(WarehouseError::SchemaFetch {
            view: view.to_string(),
            reason,
        })
    }

    /// Every metadata row for `view`. The result becomes the validation set,
    /// so it is never truncated.
    fn metadata_statement(&self, view: &str) -> Statement {
        let sql = format!(
            "SELECT column_name, description, data_type, llm_notes, example_value \
             FROM (\
             SELECT column_name, description, data_type, llm_notes, example_value, \
             EXPLODE(table_view) AS tv FROM {}\
             ) exploded \
             WHERE tv = :view \
             GROUP BY column_name, description, data_type, llm_notes, example_value \
             ORDER BY column_name",
            self.catalog.metadata_table()
        );
        Statement::new(sql).bind("view", self.catalog.qualify(view))
    }
}

fn text(row: &[Value], index: Option<usize>) -> Option<String> {
    match row.get(index?)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn index_or(rows: &ResultSet, name: &str, position: usize) -> Option<usize> {
    rows.column_index(name)
        .or_else(|| (position < rows.columns.len() || rows.columns.is_empty()).then_some(position))
}

fn metadata_rows(rows: &ResultSet) -> Vec<ColumnMetadata> {
    let name = index_or(rows, "column_name", 0);
    let description = index_or(rows, "description", 1);
    let data_type = index_or(rows, "data_type", 2);
    let notes = index_or(rows, "llm_notes", 3);
    let example = index_or(rows, "example_value", 4);

    rows.rows
        .iter()
        .filter_map(|row| {
            let column_name = text(row, name).filter(|n| !n.trim().is_empty())?;
            Some(ColumnMetadata {
                column_name,
                description: text(row, description).unwrap_or_default(),
                data_type: text(row, data_type),
                notes: text(row, notes),
                example_value: text(row, example),
            })
        })
        .collect()
}

/// Columns from `DESCRIBE TABLE` output, stopping at the first `#` section.
fn describe_rows(rows: &ResultSet) -> Vec<ColumnMetadata> {
    let name = index_or(rows, "col_name", 0);
    let data_type = index_or(rows, "data_type", 1);

    let mut columns = Vec::new();
    for row in &rows.rows {
        let Some(column_name) = text(row, name) else {
            continue;
        };
        let column_name = column_name.trim();
        if column_name.starts_with('#') {
            break;
        }
        if column_name.is_empty() {
            continue;
        }
        columns.push(ColumnMetadata {
            column_name: column_name.to_string(),
            description: String::new(),
            data_type: text(row, data_type),
            notes: None,
            example_value: None,
        });
    }
    columns
}
