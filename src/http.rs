//! Streamable-HTTP transport for the MCP server.
//!
//! Serves the MCP endpoint under `/mcp` in stateless mode, next to a plain
//! `/health` probe.

extern crate alloc;

use alloc::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::client::HoldedClient;
use crate::server::HoldedMcpServer;

/// Default listen address for HTTP mode.
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

/// Liveness probe.
#[allow(clippy::unused_async, reason = "axum handlers must be async")]
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Builds the HTTP router: `/health` plus the MCP service under `/mcp`.
///
/// Every MCP session gets its own [`HoldedMcpServer`] sharing one client.
pub fn router(client: HoldedClient) -> Router {
    let shared = Arc::new(client);
    let mcp = StreamableHttpService::new(
        move || Ok(HoldedMcpServer::from_shared(Arc::clone(&shared))),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: false,
            ..Default::default()
        },
    );
    Router::new()
        .route("/health", get(health))
        .nest_service("/mcp", mcp)
}

/// Serves [`router`] on `listener` until Ctrl-C is received.
///
/// # Errors
///
/// Returns an I/O error if the server fails while accepting connections.
pub async fn serve(listener: TcpListener, client: HoldedClient) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "MCP server listening on http://{addr}/mcp");
    }
    axum::serve(listener, router(client))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(%err, "could not listen for Ctrl-C");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "test code uses expect for readability"
)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::{Value, json};

    use super::router;
    use crate::test_support::MockHolded;

    async fn spawn_router(mock: &MockHolded) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let app = router(mock.client());
        let _server = tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let mock = MockHolded::json(200, &json!({})).await;
        let base = spawn_router(&mock).await;
        let response = reqwest::get(format!("{base}/health"))
            .await
            .expect("health request");
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.expect("json body");
        assert_eq!(body, json!({ "status": "ok" }));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn mcp_endpoint_is_mounted() {
        let mock = MockHolded::json(200, &json!({})).await;
        let base = spawn_router(&mock).await;
        let response = reqwest::Client::new()
            .post(format!("{base}/mcp"))
            .body("{}")
            .send()
            .await
            .expect("mcp request");
        assert_ne!(response.status(), StatusCode::NOT_FOUND);
    }
}
