//! Error taxonomy shared by the transport, the operation set and both
//! front-ends.

use serde::Serialize;
use thiserror::Error;

/// Upper bound, in characters, on the body snippet kept for a non-JSON reply.
pub const RESPONSE_SNIPPET_LIMIT: usize = 800;

/// Classification of a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// No response was obtained (DNS, connect, TLS, timeout).
    Network,
    /// The API answered with a status code of 400 or above.
    HttpStatus,
    /// The API answered successfully but the body was not JSON.
    InvalidResponseFormat,
}

/// A failed call to the Holded API.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    /// Failure class.
    kind: TransportErrorKind,
    /// Human-readable summary.
    message: String,
    /// HTTP status, when a response was received.
    status_code: Option<u16>,
    /// Upper-case request method.
    method: Option<String>,
    /// Resolved request URL.
    url: Option<String>,
    /// `Content-Type` of a non-JSON reply.
    content_type: Option<String>,
    /// Raw response text (full for error statuses, truncated for non-JSON replies).
    response_text: Option<String>,
}

impl TransportError {
    /// The request never produced a response.
    #[must_use]
    pub fn network(method: &str, url: &str, cause: &str) -> Self {
        Self {
            kind: TransportErrorKind::Network,
            message: format!("Network error calling Holded: {cause}"),
            status_code: None,
            method: Some(method.to_owned()),
            url: Some(url.to_owned()),
            content_type: None,
            response_text: None,
        }
    }

    /// The client could not be built, so no request was attempted.
    #[must_use]
    pub fn setup(cause: &str) -> Self {
        Self {
            kind: TransportErrorKind::Network,
            message: format!("Could not initialise the Holded client: {cause}"),
            status_code: None,
            method: None,
            url: None,
            content_type: None,
            response_text: None,
        }
    }

    /// The API rejected the request with `status`.
    #[must_use]
    pub fn http_status(
        status: u16,
        method: &str,
        path: &str,
        url: &str,
        response_text: Option<String>,
    ) -> Self {
        Self {
            kind: TransportErrorKind::HttpStatus,
            message: format!("Holded API error ({status}) calling {method} {path}"),
            status_code: Some(status),
            method: Some(method.to_owned()),
            url: Some(url.to_owned()),
            content_type: None,
            response_text,
        }
    }

    /// The API answered `status` with a body that is not JSON.
    ///
    /// Only the first [`RESPONSE_SNIPPET_LIMIT`] characters of `body` are kept.
    #[must_use]
    pub fn invalid_response_format(
        status: u16,
        content_type: &str,
        body: &str,
        method: &str,
        url: &str,
    ) -> Self {
        Self {
            kind: TransportErrorKind::InvalidResponseFormat,
            message: format!(
                "Holded returned a non-JSON response for an API request. \
                 Check HOLDED_BASE_URL and HOLDED_API_KEY. \
                 (status={status}, content-type={content_type})"
            ),
            status_code: Some(status),
            method: Some(method.to_owned()),
            url: Some(url.to_owned()),
            content_type: Some(content_type.to_owned()),
            response_text: Some(body.chars().take(RESPONSE_SNIPPET_LIMIT).collect()),
        }
    }

    /// Failure class.
    #[must_use]
    pub const fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Human-readable summary.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, when a response was received.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Upper-case request method.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Resolved request URL.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// `Content-Type` header of a non-JSON reply.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Raw response text, if any was captured.
    #[must_use]
    pub fn response_text(&self) -> Option<&str> {
        self.response_text.as_deref()
    }

    /// Serializable view of this error for tool results.
    #[must_use]
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind,
            message: self.message.clone(),
            status_code: self.status_code,
            method: self.method.clone(),
            url: self.url.clone(),
            content_type: self.content_type.clone(),
            response_text: self.response_text.clone(),
        }
    }

    /// Multi-line diagnostic for terminal output.
    ///
    /// Lines after the first appear only when the matching detail is known.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        let mut lines = vec![format!("Holded API error: {}", self.message)];
        if let Some(status) = self.status_code {
            lines.push(format!("status: {status}"));
        }
        if let (Some(method), Some(url)) = (self.method.as_deref(), self.url.as_deref()) {
            lines.push(format!("request: {method} {url}"));
        }
        if let Some(text) = self.response_text.as_deref().filter(|text| !text.is_empty()) {
            lines.push(format!("response: {text}"));
        }
        lines.join("\n")
    }
}

/// Structured form of a [`TransportError`], omitting unknown details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// Failure class.
    pub kind: TransportErrorKind,
    /// Human-readable summary.
    pub message: String,
    /// HTTP status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Request method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Resolved request URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `Content-Type` of a non-JSON reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Raw response text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
}

/// Caller input was rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(String);

impl ValidationError {
    /// Creates a validation error with the given message.
    #[must_use]
    pub fn new(message: &str) -> Self {
        Self(message.to_owned())
    }
}

/// Outcome of a failed invoice operation.
#[derive(Debug, Clone, Error)]
pub enum HoldedError {
    /// Caller-origin failure, raised before the API is contacted.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Transport-origin failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl HoldedError {
    /// Whether this failure originated from caller input.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(*self, Self::Validation(_))
    }

    /// Process exit code used by the command-line front-end.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match *self {
            Self::Validation(_) => 2,
            Self::Transport(_) => 1,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "test code uses expect for readability"
)]
mod tests {
    use super::{
        HoldedError, RESPONSE_SNIPPET_LIMIT, TransportError, TransportErrorKind, ValidationError,
    };

    #[test]
    fn http_status_diagnostic_lists_every_known_detail() {
        let err = TransportError::http_status(
            404,
            "GET",
            "/documents/invoice/abc",
            "https://api.example.test/documents/invoice/abc",
            Some("{\"info\":\"not found\"}".to_owned()),
        );
        assert_eq!(err.kind(), TransportErrorKind::HttpStatus);
        let lines: Vec<String> = err.diagnostic().lines().map(str::to_owned).collect();
        assert_eq!(
            lines,
            vec![
                "Holded API error: Holded API error (404) calling GET /documents/invoice/abc"
                    .to_owned(),
                "status: 404".to_owned(),
                "request: GET https://api.example.test/documents/invoice/abc".to_owned(),
                "response: {\"info\":\"not found\"}".to_owned(),
            ]
        );
    }

    #[test]
    fn network_diagnostic_has_no_status_line() {
        let err = TransportError::network("GET", "http://127.0.0.1:1/x", "connection refused");
        let diagnostic = err.diagnostic();
        assert!(diagnostic.starts_with("Holded API error: Network error calling Holded"));
        assert!(!diagnostic.contains("status:"));
        assert!(!diagnostic.contains("response:"));
    }

    #[test]
    fn invalid_format_snippet_is_bounded() {
        let body = "<html>".repeat(500);
        let err = TransportError::invalid_response_format(200, "text/html", &body, "GET", "u");
        let snippet = err.response_text().expect("snippet present");
        assert_eq!(snippet.chars().count(), RESPONSE_SNIPPET_LIMIT);
        assert!(err.message().contains("content-type=text/html"));
    }

    #[test]
    fn report_omits_absent_fields() {
        let err = TransportError::network("POST", "http://h/x", "timed out");
        let value = serde_json::to_value(err.report()).expect("report serializes");
        assert_eq!(value.get("kind").and_then(serde_json::Value::as_str), Some("network"));
        assert!(value.get("statusCode").is_none());
        assert!(value.get("responseText").is_none());
    }

    #[test]
    fn exit_codes_follow_error_origin() {
        let validation = HoldedError::from(ValidationError::new("bad payload"));
        let transport = HoldedError::from(TransportError::network("GET", "u", "down"));
        assert!(validation.is_validation());
        assert_eq!(validation.exit_code(), 2);
        assert!(!transport.is_validation());
        assert_eq!(transport.exit_code(), 1);
    }
}
