//! `viewgate check`: validate configuration and credentials before serving.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use viewgate_core::{ViewCatalog, ViewgateConfig};
use viewgate_warehouse::{DatabricksExecutor, Statement, StatementExecutor};

use super::{DEFAULT_CONFIG, load_config};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG, env = "VIEWGATE_CONFIG")]
    pub config: PathBuf,

    /// Also run a trivial statement against the warehouse.
    #[arg(long)]
    pub connect: bool,
}

pub async fn execute(args: CheckArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    for line in summary(&config) {
        println!("{line}");
    }

    let credentials = config
        .warehouse
        .credentials()
        .context("Warehouse credentials are not configured")?;
    let warehouse = DatabricksExecutor::new(&credentials, config.warehouse.wait_timeout_secs)
        .context("Invalid warehouse settings")?;
    println!(
        "✓ Credentials found (host {}, warehouse {})",
        credentials.host,
        warehouse.warehouse_id()
    );

    if args.connect {
        warehouse
            .execute(&Statement::new("SELECT 1"))
            .await
            .context("Warehouse did not answer SELECT 1")?;
        println!("✓ Warehouse reachable");
    }

    Ok(())
}

fn summary(config: &ViewgateConfig) -> Vec<String> {
    let catalog = ViewCatalog::new(&config.catalog);
    let mut lines = vec![format!(
        "✓ Configuration valid: {} views in {}",
        catalog.allowed_views().len(),
        catalog.namespace()
    )];
    lines.extend(catalog.allowed_views().iter().map(|view| format!("  - {view}")));
    lines.push(format!(
        "  transport {}, row limit {} (max {}), history {}",
        config.mcp.transport,
        config.query.default_limit,
        config.query.max_rows,
        config.session.history_limit
    ));
    lines
}
