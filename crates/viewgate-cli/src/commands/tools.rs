//! `viewgate tools`: print the tool surface without connecting anywhere.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use viewgate_mcp::ToolRegistry;
use viewgate_mcp::surface::register_tools;

use super::{DEFAULT_CONFIG, load_config};

#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG, env = "VIEWGATE_CONFIG")]
    pub config: PathBuf,

    /// Print MCP tool definitions (as sent by tools/list) instead of the catalogue.
    #[arg(long)]
    pub definitions: bool,
}

pub fn execute(args: ToolsArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    println!("{}", render(config.query.default_limit, args.definitions)?);
    Ok(())
}

fn render(default_limit: u32, definitions: bool) -> Result<String> {
    let mut registry = ToolRegistry::new();
    register_tools(&mut registry, default_limit);

    let output = if definitions {
        serde_json::to_string_pretty(&registry.definitions())?
    } else {
        serde_json::to_string_pretty(&registry.catalogue())?
    };
    Ok(output)
}
