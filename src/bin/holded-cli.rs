//! Holded invoicing CLI entry point.
//!
//! Parses the command line, runs one invoice operation and maps the outcome
//! onto the process exit code.

use std::process::ExitCode;

use clap::Parser;
use holded_mcp::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics go to stderr; stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    ExitCode::from(cli::run(args).await)
}
