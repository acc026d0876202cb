//! Adapter for the Holded invoicing API.
//!
//! The library performs one HTTP call per invoice operation and classifies
//! every failure. Two front-ends sit on top of it: an MCP tool server
//! (`holded-mcp`) and a command-line client (`holded-cli`).

pub mod cli;
pub mod client;
pub mod config;
pub mod date_filter;
pub mod error;
pub mod http;
pub mod invoices;
mod params;
pub mod server;

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    clippy::missing_panics_doc,
    reason = "test-only mock server panics on broken test setup"
)]
mod test_support;
