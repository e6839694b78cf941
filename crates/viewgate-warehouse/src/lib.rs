//! # viewgate-warehouse
//!
//! Everything that talks to the SQL warehouse.
//!
//! - [`StatementExecutor`]: the execution seam, one statement in, rows out.
//! - [`DatabricksExecutor`]: the Databricks SQL Statement Execution API.
//! - [`SchemaRegistry`]: view allow-list plus cached column metadata.

pub mod databricks;
pub mod error;
pub mod executor;
pub mod registry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use databricks::DatabricksExecutor;
pub use error::WarehouseError;
pub use executor::{ResultSet, Statement, StatementExecutor, StatementParameter};
pub use registry::{ColumnMetadata, SchemaRegistry};
