use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{check::CheckArgs, serve::ServeArgs, tools::ToolsArgs};

#[derive(Parser, Debug)]
#[command(
    name = "viewgate",
    version,
    about = "MCP tool server for querying allow-listed warehouse views"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the MCP server over stdio or HTTP.
    Serve(ServeArgs),

    /// Print the tool registry as JSON. Needs no credentials.
    Tools(ToolsArgs),

    /// Validate configuration and warehouse credentials.
    Check(CheckArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout belongs to the stdio transport.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Serve(args) => commands::serve::execute(args).await?,
        Command::Tools(args) => commands::tools::execute(args)?,
        Command::Check(args) => commands::check::execute(args).await?,
    }

    Ok(())
}
