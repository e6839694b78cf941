//! The view allow-list.
//!
//! [`ViewCatalog`] is the single authority on which relations may appear in a
//! generated query. It never performs I/O.

use crate::config::{CatalogConfig, ViewDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A join relationship between two allow-listed views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub source_table: String,
    pub foreign_key: String,
    pub primary_key_table: String,
    pub primary_key: String,
    pub relationship: String,
}

/// Static allow-list of queryable views.
#[derive(Debug, Clone)]
pub struct ViewCatalog {
    catalog: String,
    schema: String,
    metadata_table: String,
    join_key: String,
    views: Vec<ViewDescriptor>,
    names: BTreeSet<String>,
}

impl Default for ViewCatalog {
    fn default() -> Self {
        Self::new(&CatalogConfig::default())
    }
}

impl ViewCatalog {
    /// Build the catalog from configuration.
    pub fn new(config: &CatalogConfig) -> Self {
        let names = config.views.iter().map(|v| v.view.clone()).collect();
        Self {
            catalog: config.catalog.clone(),
            schema: config.schema.clone(),
            metadata_table: config.metadata_table.clone(),
            join_key: config.join_key.clone(),
            views: config.views.clone(),
            names,
        }
    }

    /// All allow-listed view names.
    pub fn allowed_views(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// Whether `view` is allow-listed. Matching is exact.
    pub fn is_allowed(&self, view: &str) -> bool {
        self.names.contains(view)
    }

    /// Descriptions in configuration order.
    pub fn descriptors(&self) -> &[ViewDescriptor] {
        &self.views
    }

    /// The shared join column.
    pub fn join_key(&self) -> &str {
        &self.join_key
    }

    /// `catalog.schema` prefix used to qualify relations.
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.catalog, self.schema)
    }

    /// Fully qualified relation name for a view.
    pub fn qualify(&self, view: &str) -> String {
        format!("{}.{}.{}", self.catalog, self.schema, view)
    }

    /// Fully qualified name of the column metadata table.
    pub fn metadata_table(&self) -> String {
        self.qualify(&self.metadata_table)
    }

    /// Relationships from `source` to every other view via the join key.
    ///
    /// Returns an empty list when `source` is not allow-listed.
    pub fn relationships(&self, source: &str) -> Vec<Relationship> {
        if !self.is_allowed(source) {
            return Vec::new();
        }
        self.views
            .iter()
            .filter(|v| v.view != source)
            .map(|v| Relationship {
                source_table: source.to_string(),
                foreign_key: self.join_key.clone(),
                primary_key_table: v.view.clone(),
                primary_key: self.join_key.clone(),
                relationship: "one-to-one".to_string(),
            })
            .collect()
    }
}
