//! Thin `reqwest` wrapper performing exactly one Holded API call per
//! invocation.
//!
//! Every failure is classified into a [`TransportError`]; nothing is
//! retried or cached.

use core::fmt;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::config::Settings;
use crate::error::TransportError;

/// Name of the header carrying the API credential.
const API_KEY_HEADER: &str = "key";
/// Upper bound on followed redirects.
const MAX_REDIRECTS: usize = 10;

/// Query parameters of one request; absent values are never recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Name/value pairs in insertion order.
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    /// Creates an empty parameter set.
    #[must_use]
    pub const fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Adds `name=value` when `value` is present; `None` leaves the set untouched.
    pub fn push<T: ToString>(&mut self, name: &'static str, value: Option<T>) {
        if let Some(present) = value {
            self.pairs.push((name, present.to_string()));
        }
    }

    /// Whether no parameter was recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Recorded pairs in insertion order.
    #[must_use]
    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }
}

/// Connection to the Holded API.
///
/// Cloning is cheap and shares the underlying connection pool. The pool is
/// released once the last clone is dropped or [`HoldedClient::close`]d.
#[derive(Clone)]
pub struct HoldedClient {
    /// Pooled HTTP client carrying the credential and timeout.
    http: reqwest::Client,
    /// API root without a trailing slash.
    base_url: String,
}

impl fmt::Debug for HoldedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HoldedClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HoldedClient {
    /// Opens a connection pool configured from `settings`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the API key is not a valid header
    /// value or the TLS backend cannot be initialised.
    pub fn new(settings: &Settings) -> Result<Self, TransportError> {
        let mut api_key = HeaderValue::from_str(settings.api_key()).map_err(|_err| {
            TransportError::setup("HOLDED_API_KEY contains characters not allowed in a header")
        })?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        let _previous_key = headers.insert(HeaderName::from_static(API_KEY_HEADER), api_key);
        let _previous_type =
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(concat!("holded-mcp/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(settings.timeout())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|err| TransportError::setup(&err.to_string()))?;

        tracing::debug!(base_url = settings.base_url(), "opened Holded connection pool");
        Ok(Self {
            http,
            base_url: settings.base_url().to_owned(),
        })
    }

    /// API root this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Performs one request and returns the decoded JSON body.
    ///
    /// `path` is made absolute before being appended to the base URL.
    ///
    /// # Errors
    ///
    /// - `Network` when no response was obtained (including timeouts).
    /// - `HttpStatus` for any status of 400 or above.
    /// - `InvalidResponseFormat` when a successful response is not JSON.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Option<&QueryParams>,
        body: Option<&Value>,
    ) -> Result<Value, TransportError> {
        let canonical = canonical_path(path);
        let url = format!("{}{canonical}", self.base_url);
        let method_name = method.as_str().to_owned();
        tracing::debug!(method = %method_name, %url, "calling Holded");

        let mut request = self.http.request(method, &url);
        if let Some(params) = query.filter(|params| !params.is_empty()) {
            request = request.query(params.pairs());
        }
        if let Some(json) = body {
            request = request.json(json);
        }

        let response = request
            .send()
            .await
            .map_err(|err| logged(TransportError::network(&method_name, &url, &err.to_string())))?;

        let status = response.status().as_u16();
        let resolved_url = response.url().to_string();

        if status >= 400 {
            let text = response.text().await.ok();
            return Err(logged(TransportError::http_status(
                status,
                &method_name,
                &canonical,
                &resolved_url,
                text,
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let raw = response.bytes().await.map_err(|err| {
            logged(TransportError::network(
                &method_name,
                &resolved_url,
                &err.to_string(),
            ))
        })?;

        serde_json::from_slice::<Value>(&raw).map_err(|_err| {
            logged(TransportError::invalid_response_format(
                status,
                &content_type,
                &String::from_utf8_lossy(&raw),
                &method_name,
                &resolved_url,
            ))
        })
    }

    /// Releases the connection pool held by this handle.
    pub fn close(self) {
        drop(self.http);
        tracing::debug!(base_url = %self.base_url, "released Holded connection pool");
    }
}

/// Returns `path` with exactly one leading `/`.
fn canonical_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Records a classified failure before handing it back.
fn logged(err: TransportError) -> TransportError {
    tracing::warn!(
        status = err.status_code(),
        method = err.method(),
        url = err.url(),
        error = %err,
        "Holded call failed"
    );
    err
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "test code uses expect for readability"
)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::{HoldedClient, QueryParams, canonical_path};
    use crate::config::Settings;
    use crate::error::TransportErrorKind;
    use crate::test_support::MockHolded;

    #[test]
    fn paths_are_made_absolute() {
        assert_eq!(canonical_path("documents/invoice"), "/documents/invoice");
        assert_eq!(canonical_path("/documents/invoice"), "/documents/invoice");
        assert_eq!(canonical_path("//documents"), "/documents");
    }

    const fn nothing_recorded(params: &QueryParams) -> bool {
        params.is_empty()
    }

    #[test]
    fn emptiness_is_usable_in_const_context() {
        const EMPTY: QueryParams = QueryParams::new();
        assert!(nothing_recorded(&EMPTY));
        let mut params = QueryParams::new();
        params.push("limit", Some(5_u64));
        assert!(!nothing_recorded(&params));
    }

    #[test]
    fn absent_query_values_are_skipped() {
        let mut params = QueryParams::new();
        params.push("status", Some(1_i64));
        params.push::<String>("sort", None);
        params.push("current", Some(false));
        assert_eq!(
            params.pairs(),
            &[("status", "1".to_owned()), ("current", "false".to_owned())]
        );
    }

    #[tokio::test]
    async fn success_returns_decoded_json_and_sends_credentials() {
        let mock = MockHolded::json(200, &json!({ "id": "inv-1" })).await;
        let value = mock
            .client()
            .execute(Method::GET, "documents/invoice/inv-1", None, None)
            .await
            .expect("call should succeed");
        assert_eq!(value, json!({ "id": "inv-1" }));

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        let request = requests.first().expect("one request");
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/documents/invoice/inv-1");
        assert_eq!(request.api_key.as_deref(), Some("test-key"));
        assert_eq!(request.content_type.as_deref(), Some("application/json"));
        assert!(request.query.is_none());
    }

    #[tokio::test]
    async fn scalar_json_is_returned_unchanged() {
        let mock = MockHolded::json(200, &json!("just a string")).await;
        let value = mock
            .client()
            .execute(Method::GET, "/x", None, None)
            .await
            .expect("call should succeed");
        assert_eq!(value, json!("just a string"));
    }

    #[tokio::test]
    async fn redirects_are_followed() {
        let mock = MockHolded::json(200, &json!({ "id": "moved" }))
            .await
            .with_redirect("/documents/invoice/old", "/documents/invoice/new");
        let value = mock
            .client()
            .execute(Method::GET, "/documents/invoice/old", None, None)
            .await
            .expect("redirected call should succeed");
        assert_eq!(value, json!({ "id": "moved" }));
        let paths: Vec<String> = mock
            .requests()
            .into_iter()
            .map(|request| request.path)
            .collect();
        assert_eq!(
            paths,
            vec![
                "/documents/invoice/old".to_owned(),
                "/documents/invoice/new".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn errors_after_a_redirect_report_the_final_url() {
        let mock = MockHolded::start(404, "application/json", "{\"info\":\"Not found\"}")
            .await
            .with_redirect("/documents/invoice/old", "/documents/invoice/gone");
        let err = mock
            .client()
            .execute(Method::GET, "/documents/invoice/old", None, None)
            .await
            .expect_err("404 after redirect");
        assert_eq!(err.kind(), TransportErrorKind::HttpStatus);
        assert_eq!(err.status_code(), Some(404));
        let expected = format!("{}/documents/invoice/gone", mock.base_url());
        assert_eq!(err.url(), Some(expected.as_str()));
        assert_eq!(mock.last_request().api_key.as_deref(), Some("test-key"));
    }

    #[tokio::test]
    async fn query_and_body_are_transmitted() {
        let mock = MockHolded::json(200, &json!({ "status": 1_i64 })).await;
        let mut params = QueryParams::new();
        params.push("limit", Some(5_i64));
        params.push::<i64>("offset", None);
        let body = json!({ "amount": 10.5_f64 });
        let _value = mock
            .client()
            .execute(Method::POST, "/documents/invoice", Some(&params), Some(&body))
            .await
            .expect("call should succeed");

        let request = mock.last_request();
        assert_eq!(request.method, "POST");
        assert_eq!(request.query.as_deref(), Some("limit=5"));
        assert_eq!(request.json_body(), Some(body));
    }

    #[tokio::test]
    async fn error_status_is_classified_with_details() {
        let mock = MockHolded::start(404, "application/json", "{\"info\":\"missing\"}").await;
        let err = mock
            .client()
            .execute(Method::GET, "/documents/invoice/nope", None, None)
            .await
            .expect_err("404 must fail");
        assert_eq!(err.kind(), TransportErrorKind::HttpStatus);
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.method(), Some("GET"));
        assert_eq!(
            err.url(),
            Some(format!("{}/documents/invoice/nope", mock.base_url()).as_str())
        );
        assert_eq!(err.response_text(), Some("{\"info\":\"missing\"}"));
    }

    #[tokio::test]
    async fn html_success_is_an_invalid_format() {
        let page = format!("<!doctype html><html>{}</html>", "x".repeat(5000));
        let mock = MockHolded::start(200, "text/html; charset=utf-8", &page).await;
        let err = mock
            .client()
            .execute(Method::GET, "/documents/invoice", None, None)
            .await
            .expect_err("html must fail");
        assert_eq!(err.kind(), TransportErrorKind::InvalidResponseFormat);
        assert_eq!(err.status_code(), Some(200));
        assert_eq!(err.content_type(), Some("text/html; charset=utf-8"));
        let snippet = err.response_text().expect("snippet present");
        assert_eq!(snippet.chars().count(), 800);
        assert!(snippet.starts_with("<!doctype html>"));
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let settings =
            Settings::new("test-key", &format!("http://{addr}"), 2.0_f64).expect("valid settings");
        let client = HoldedClient::new(&settings).expect("client builds");
        let err = client
            .execute(Method::GET, "/documents/invoice", None, None)
            .await
            .expect_err("nothing listens there");
        assert_eq!(err.kind(), TransportErrorKind::Network);
        assert_eq!(err.status_code(), None);
    }

    #[tokio::test]
    async fn timeout_is_a_network_error() {
        let mock = MockHolded::json(200, &json!({})).await.with_delay_ms(1_500);
        let settings = Settings::new("test-key", mock.base_url(), 0.2_f64).expect("valid settings");
        let client = HoldedClient::new(&settings).expect("client builds");
        let err = client
            .execute(Method::GET, "/documents/invoice", None, None)
            .await
            .expect_err("should time out");
        assert_eq!(err.kind(), TransportErrorKind::Network);
    }
}
