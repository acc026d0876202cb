//! Holded MCP server entry point.
//!
//! Reads the Holded settings from the environment, creates one shared
//! [`HoldedClient`], then serves MCP tools over stdio or streamable HTTP.

use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use holded_mcp::client::HoldedClient;
use holded_mcp::config::Settings;
use holded_mcp::http;
use holded_mcp::server::HoldedMcpServer;
use rmcp::ServiceExt;
use tracing_subscriber::EnvFilter;

/// MCP transport to serve on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// Newline-delimited JSON-RPC over stdin/stdout.
    Stdio,
    /// Streamable HTTP under `/mcp`.
    Http,
}

/// MCP server for the Holded invoicing API
#[derive(Debug, Parser)]
#[command(name = "holded-mcp", version, about)]
struct Args {
    /// Transport to serve on
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Listen address for the HTTP transport
    #[arg(long, default_value = http::DEFAULT_BIND)]
    bind: String,
}

/// Runs the MCP server.
///
/// # Errors
///
/// Returns an error if the settings are invalid, the client cannot be
/// built, the listen address cannot be bound, or the transport fails.
async fn run(args: Args) -> Result<(), Box<dyn core::error::Error>> {
    tracing::info!("starting Holded MCP server");

    let settings = Settings::from_env()?;
    let client = HoldedClient::new(&settings)?;
    tracing::info!(base_url = client.base_url(), "Holded client ready");

    match args.transport {
        Transport::Stdio => {
            let transport = (tokio::io::stdin(), tokio::io::stdout());
            let service = HoldedMcpServer::new(client).serve(transport).await?;
            tracing::info!("MCP server running on stdio");
            let _quit_reason = service.waiting().await?;
        }
        Transport::Http => {
            let listener = tokio::net::TcpListener::bind(&args.bind).await?;
            http::serve(listener, client).await?;
        }
    }

    tracing::info!("MCP server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialise tracing to stderr (stdout is used for MCP stdio transport).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "fatal error");
            ExitCode::FAILURE
        }
    }
}
