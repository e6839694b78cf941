//! `viewgate serve`: run the MCP server.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use viewgate_core::{Transport, ViewCatalog, ViewgateConfig};
use viewgate_mcp::{McpServer, SessionStore, ToolExecutor};
use viewgate_warehouse::DatabricksExecutor;

use super::{DEFAULT_CONFIG, load_config};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG, env = "VIEWGATE_CONFIG")]
    pub config: PathBuf,

    /// Transport: stdio or http. Overrides the config file.
    #[arg(long)]
    pub transport: Option<Transport>,

    /// HTTP host. Overrides the config file.
    #[arg(long)]
    pub host: Option<String>,

    /// HTTP port. Overrides the config file.
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl ServeArgs {
    /// Apply command-line overrides on top of the loaded file.
    fn apply(&self, config: &mut ViewgateConfig) {
        if let Some(transport) = self.transport {
            config.mcp.transport = transport;
        }
        if let Some(host) = &self.host {
            config.mcp.host = host.clone();
        }
        if let Some(port) = self.port {
            config.mcp.port = port;
        }
    }
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    args.apply(&mut config);

    let credentials = config
        .warehouse
        .credentials()
        .context("Warehouse credentials are required to serve")?;
    let warehouse = DatabricksExecutor::new(&credentials, config.warehouse.wait_timeout_secs)
        .context("Invalid warehouse settings")?;

    let catalog = Arc::new(ViewCatalog::new(&config.catalog));
    info!(
        views = catalog.allowed_views().len(),
        namespace = %catalog.namespace(),
        warehouse = %warehouse.warehouse_id(),
        "Loaded view catalog"
    );

    let executor = ToolExecutor::new(
        catalog,
        Arc::new(warehouse),
        Arc::new(SessionStore::new(config.session.history_limit)),
        config.query.clone(),
    );

    match config.mcp.transport {
        Transport::Stdio => info!("Serving over stdio"),
        Transport::Http => info!(address = %config.mcp.bind_address(), "Serving over HTTP"),
    }

    McpServer::new(config.mcp.clone(), Arc::new(executor))
        .with_default_session(config.session.default_session_id.clone())
        .run()
        .await
        .context("MCP server stopped with an error")?;

    Ok(())
}
