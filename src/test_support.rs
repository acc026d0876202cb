//! In-process stand-in for the Holded API used by the async tests.
//!
//! Every request is recorded and answered with one canned response.

extern crate alloc;

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::sync::Mutex;

use axum::Router;
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::client::HoldedClient;
use crate::config::Settings;

/// One request as seen by the mock.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) api_key: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) body: String,
}

impl RecordedRequest {
    /// Body decoded as JSON, `None` when empty or not JSON.
    pub(crate) fn json_body(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// Decoded query pairs in request order.
    pub(crate) fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                (name.to_owned(), value.replace("%2C", ",").replace('+', " "))
            })
            .collect()
    }
}

#[derive(Debug)]
struct MockState {
    status: StatusCode,
    content_type: String,
    body: String,
    delay_ms: AtomicU64,
    redirects: Mutex<Vec<(String, String)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Running mock server bound to an ephemeral localhost port.
#[derive(Debug)]
pub(crate) struct MockHolded {
    base_url: String,
    state: Arc<MockState>,
}

impl MockHolded {
    /// Starts a mock answering every request with `status`, `content_type` and `body`.
    pub(crate) async fn start(status: u16, content_type: &str, body: &str) -> Self {
        let state = Arc::new(MockState {
            status: StatusCode::from_u16(status).expect("valid status for test"),
            content_type: content_type.to_owned(),
            body: body.to_owned(),
            delay_ms: AtomicU64::new(0),
            redirects: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let router = Router::new()
            .fallback(record)
            .with_state(Arc::clone(&state));
        let _server = tokio::spawn(async move { axum::serve(listener, router).await });
        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// Starts a mock answering every request with `status` and a JSON body.
    pub(crate) async fn json(status: u16, body: &Value) -> Self {
        Self::start(status, "application/json", &body.to_string()).await
    }

    /// Delays every response by `millis`.
    pub(crate) fn with_delay_ms(self, millis: u64) -> Self {
        self.state.delay_ms.store(millis, Ordering::Relaxed);
        self
    }

    /// Answers requests for `from` with `302 Found` pointing at `to`.
    pub(crate) fn with_redirect(self, from: &str, to: &str) -> Self {
        self.state
            .redirects
            .lock()
            .expect("mock lock")
            .push((from.to_owned(), to.to_owned()));
        self
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A client pointed at this mock with the key `test-key`.
    pub(crate) fn client(&self) -> HoldedClient {
        let settings =
            Settings::new("test-key", &self.base_url, 5.0_f64).expect("valid settings for test");
        HoldedClient::new(&settings).expect("client builds")
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().expect("mock lock").clone()
    }

    pub(crate) fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("at least one request")
    }
}

async fn record(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let header_text = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };
    let request = RecordedRequest {
        method: method.as_str().to_owned(),
        path: uri.path().to_owned(),
        query: uri.query().map(str::to_owned),
        api_key: header_text("key"),
        content_type: header_text("content-type"),
        body,
    };
    state.requests.lock().expect("mock lock").push(request);

    let target = state
        .redirects
        .lock()
        .expect("mock lock")
        .iter()
        .find(|redirect| redirect.0 == uri.path())
        .map(|redirect| redirect.1.clone());
    if let Some(location) = target {
        return (StatusCode::FOUND, [(LOCATION, location)]).into_response();
    }

    let delay = state.delay_ms.load(Ordering::Relaxed);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    (
        state.status,
        [(CONTENT_TYPE, state.content_type.clone())],
        state.body.clone(),
    )
        .into_response()
}
