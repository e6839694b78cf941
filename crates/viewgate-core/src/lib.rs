//! # viewgate-core
//!
//! Configuration and the view allow-list shared across all viewgate crates.

pub mod catalog;
pub mod config;

pub use catalog::{Relationship, ViewCatalog};
pub use config::{
    CatalogConfig, ConfigError, McpConfig, QueryConfig, SessionConfig, Transport,
    UnparsedPolicy, ViewDescriptor, ViewgateConfig, WarehouseConfig, WarehouseCredentials,
};
