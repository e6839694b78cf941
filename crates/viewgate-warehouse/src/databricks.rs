//! Databricks SQL Statement Execution API client.
//!
//! Statements are submitted synchronously with `wait_timeout`; the warehouse
//! cancels them if they do not finish in time. Results are requested inline
//! in `JSON_ARRAY` format and further chunks are followed until exhausted.

use crate::error::WarehouseError;
use crate::executor::{ResultSet, Statement, StatementExecutor};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};
use viewgate_core::WarehouseCredentials;

/// Bounds the API accepts for `wait_timeout`, in seconds.
const MIN_WAIT_SECS: u32 = 5;
const MAX_WAIT_SECS: u32 = 50;

#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    statement_id: Option<String>,
    #[serde(default)]
    status: Option<StatementStatus>,
    #[serde(default)]
    manifest: Option<Manifest>,
    #[serde(default)]
    result: Option<ResultChunk>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    schema: Option<ManifestSchema>,
}

#[derive(Debug, Deserialize)]
struct ManifestSchema {
    #[serde(default)]
    columns: Vec<ManifestColumn>,
}

#[derive(Debug, Deserialize)]
struct ManifestColumn {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResultChunk {
    #[serde(default)]
    data_array: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    next_chunk_internal_link: Option<String>,
}

/// Executes statements on a Databricks SQL warehouse.
pub struct DatabricksExecutor {
    client: reqwest::Client,
    base_url: String,
    token: String,
    warehouse_id: String,
    wait_timeout_secs: u32,
}

impl std::fmt::Debug for DatabricksExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabricksExecutor")
            .field("base_url", &self.base_url)
            .field("warehouse_id", &self.warehouse_id)
            .field("wait_timeout_secs", &self.wait_timeout_secs)
            .finish()
    }
}

impl DatabricksExecutor {
    /// Create an executor from credentials.
    ///
    /// The warehouse id is the last segment of the HTTP path, e.g.
    /// `/sql/1.0/warehouses/abc123`.
    pub fn new(
        credentials: &WarehouseCredentials,
        wait_timeout_secs: u32,
    ) -> Result<Self, WarehouseError> {
        let host = credentials
            .host
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        if host.is_empty() {
            return Err(WarehouseError::Config("warehouse host is empty".to_string()));
        }

        let warehouse_id = warehouse_id_from_path(&credentials.http_path).ok_or_else(|| {
            WarehouseError::Config(format!(
                "cannot derive a warehouse id from HTTP path '{}'",
                credentials.http_path
            ))
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: format!("https://{host}"),
            token: credentials.token.clone(),
            warehouse_id,
            wait_timeout_secs: wait_timeout_secs.clamp(MIN_WAIT_SECS, MAX_WAIT_SECS),
        })
    }

    pub fn warehouse_id(&self) -> &str {
        &self.warehouse_id
    }

    fn request_body(&self, statement: &Statement) -> Value {
        json!({
            "warehouse_id": self.warehouse_id,
            "statement": statement.sql,
            "parameters": statement.parameters,
            "wait_timeout": format!("{}s", self.wait_timeout_secs),
            "on_wait_timeout": "CANCEL",
            "format": "JSON_ARRAY",
            "disposition": "INLINE",
        })
    }

    async fn fetch_chunk(&self, link: &str) -> Result<ResultChunk, WarehouseError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, link))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .json::<ResultChunk>()
            .await
            .map_err(|e| WarehouseError::Decode(e.to_string()))
    }
}

#[async_trait]
impl StatementExecutor for DatabricksExecutor {
    async fn execute(&self, statement: &Statement) -> Result<ResultSet, WarehouseError> {
        debug!(sql = %statement.sql, params = statement.parameters.len(), "Submitting statement");

        let response = self
            .client
            .post(format!("{}/api/2.0/sql/statements", self.base_url))
            .bearer_auth(&self.token)
            .json(&self.request_body(statement))
            .send()
            .await?;
        let response = check_status(response).await?;
        let payload: StatementResponse = response
            .json()
            .await
            .map_err(|e| WarehouseError::Decode(e.to_string()))?;

        let status = payload
            .status
            .ok_or_else(|| WarehouseError::Decode("response has no status".to_string()))?;
        if status.state != "SUCCEEDED" {
            let message = status
                .error
                .map(|e| match (e.error_code, e.message) {
                    (Some(code), Some(message)) => format!("[{code}] {message}"),
                    (_, Some(message)) => message,
                    (Some(code), None) => code,
                    (None, None) => "no error details".to_string(),
                })
                .unwrap_or_else(|| "no error details".to_string());
            warn!(
                statement_id = payload.statement_id.as_deref().unwrap_or("-"),
                state = %status.state,
                "Statement did not succeed"
            );
            return Err(WarehouseError::Statement {
                state: status.state,
                message,
            });
        }

        let columns = payload
            .manifest
            .and_then(|m| m.schema)
            .map(|s| s.columns.into_iter().map(|c| c.name).collect())
            .unwrap_or_default();

        let mut chunk = payload.result.unwrap_or_default();
        let mut rows = chunk.data_array.take().unwrap_or_default();
        while let Some(link) = chunk.next_chunk_internal_link.take() {
            chunk = self.fetch_chunk(&link).await?;
            rows.extend(chunk.data_array.take().unwrap_or_default());
        }

        debug!(rows = rows.len(), "Statement succeeded");
        Ok(ResultSet::new(columns, rows))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, WarehouseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(WarehouseError::Http {
        status: status.as_u16(),
        message,
    })
}

fn warehouse_id_from_path(http_path: &str) -> Option<String> {
    http_path
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
