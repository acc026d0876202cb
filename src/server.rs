//! MCP server implementation wrapping the Holded invoicing API.
//!
//! Uses `rmcp` macros to expose each invoice operation as an MCP tool.

extern crate alloc;

use alloc::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use serde_json::Value;

use crate::client::HoldedClient;
use crate::error::{HoldedError, TransportError, ValidationError};
use crate::invoices;
use crate::params::{
    ApproveInvoiceParams, CreateInvoiceParams, DocumentParams, ListInvoicesParams,
    PayInvoiceParams, SendInvoiceParams, UpdateInvoiceParams,
};

/// MCP server exposing Holded invoice operations as tools.
#[derive(Clone)]
pub struct HoldedMcpServer {
    /// Holded API client (shared via Arc).
    client: Arc<HoldedClient>,
    /// Tool router for dispatching MCP tool calls.
    tool_router: ToolRouter<Self>,
}

impl core::fmt::Debug for HoldedMcpServer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HoldedMcpServer")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

/// Converts rejected caller input into an MCP `invalid_params` error.
#[allow(clippy::needless_pass_by_value, reason = "map_err passes by value")]
fn invalid_params(err: ValidationError) -> McpError {
    McpError::invalid_params(err.to_string(), None)
}

/// Serializes a value to a pretty-printed JSON string for tool output.
fn to_json_text<T: serde::Serialize>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value).map_err(|err| {
        McpError::internal_error(format!("failed to serialize response: {err}"), None)
    })
}

/// Creates a successful tool result: objects as structured content, anything
/// else as JSON text.
fn json_result(value: Value) -> Result<CallToolResult, McpError> {
    if value.is_object() {
        Ok(CallToolResult::structured(value))
    } else {
        let text = to_json_text(&value)?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

/// Creates a tool error result describing a failed Holded call.
fn transport_failure(err: &TransportError) -> Result<CallToolResult, McpError> {
    let report = serde_json::to_value(err.report()).map_err(|serialize_err| {
        McpError::internal_error(format!("failed to serialize error: {serialize_err}"), None)
    })?;
    Ok(CallToolResult::structured_error(report))
}

/// Maps an operation outcome onto the MCP result shape.
///
/// Caller mistakes become protocol errors; API failures become tool error
/// results so the agent still receives the details.
fn tool_result(outcome: Result<Value, HoldedError>) -> Result<CallToolResult, McpError> {
    match outcome {
        Ok(value) => json_result(value),
        Err(HoldedError::Validation(err)) => Err(invalid_params(err)),
        Err(HoldedError::Transport(err)) => transport_failure(&err),
    }
}

#[tool_router]
impl HoldedMcpServer {
    /// Creates a new MCP server owning the given client.
    #[must_use]
    pub fn new(client: HoldedClient) -> Self {
        Self::from_shared(Arc::new(client))
    }

    /// Creates a new MCP server sharing an existing client.
    #[must_use]
    pub fn from_shared(client: Arc<HoldedClient>) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    // ── Read tools ──────────────────────────────────────────────────

    /// Lists invoices with optional filters.
    #[tool(
        description = "List invoices with optional filters: status (0 draft, 1 pending, 2 approved), current, dateFrom/dateTo and updatedFrom/updatedTo (YYYY-MM-DD), sort, order, limit, offset. GET /documents/invoice"
    )]
    async fn holded_invoices_list(
        &self,
        params: Parameters<ListInvoicesParams>,
    ) -> Result<CallToolResult, McpError> {
        let query = params.0.into_query().map_err(invalid_params)?;
        tool_result(invoices::list_invoices(&self.client, &query).await)
    }

    /// Fetches one invoice.
    #[tool(description = "Get an invoice by id. GET /documents/invoice/{documentId}")]
    async fn holded_invoices_get(
        &self,
        params: Parameters<DocumentParams>,
    ) -> Result<CallToolResult, McpError> {
        tool_result(invoices::get_invoice(&self.client, &params.0.document_id).await)
    }

    /// Fetches the PDF rendition of an invoice.
    #[tool(
        description = "Get the PDF (base64) of an invoice. GET /documents/invoice/{documentId}/pdf"
    )]
    async fn holded_invoices_pdf(
        &self,
        params: Parameters<DocumentParams>,
    ) -> Result<CallToolResult, McpError> {
        tool_result(invoices::invoice_pdf(&self.client, &params.0.document_id).await)
    }

    // ── Write tools ─────────────────────────────────────────────────

    /// Creates an invoice.
    #[tool(
        description = "Create an invoice. POST /documents/invoice. The payload is sent as-is; use Holded fields (contactId/contactName, date, items, ...)"
    )]
    async fn holded_invoices_create(
        &self,
        params: Parameters<CreateInvoiceParams>,
    ) -> Result<CallToolResult, McpError> {
        tool_result(invoices::create_invoice(&self.client, &params.0.payload).await)
    }

    /// Updates an invoice.
    #[tool(
        description = "Update an invoice. PUT /documents/invoice/{documentId}. The payload is sent as-is (desc, notes, date, items, customFields, ...)"
    )]
    async fn holded_invoices_update(
        &self,
        params: Parameters<UpdateInvoiceParams>,
    ) -> Result<CallToolResult, McpError> {
        let UpdateInvoiceParams {
            document_id,
            payload,
        } = params.0;
        tool_result(invoices::update_invoice(&self.client, &document_id, &payload).await)
    }

    /// Approves a draft invoice.
    #[tool(
        description = "Approve (number) a draft invoice, like the 'Approve/Issue' action of the web app. POST /doc/invoice/{documentId}/draftmode/approve"
    )]
    async fn holded_invoices_approve(
        &self,
        params: Parameters<ApproveInvoiceParams>,
    ) -> Result<CallToolResult, McpError> {
        let ApproveInvoiceParams { document_id, info } = params.0;
        tool_result(
            invoices::approve_invoice(&self.client, &document_id, info.as_deref()).await,
        )
    }

    /// Deletes an invoice.
    #[tool(description = "Delete an invoice. DELETE /documents/invoice/{documentId}")]
    async fn holded_invoices_delete(
        &self,
        params: Parameters<DocumentParams>,
    ) -> Result<CallToolResult, McpError> {
        tool_result(invoices::delete_invoice(&self.client, &params.0.document_id).await)
    }

    /// Registers a payment.
    #[tool(
        description = "Mark an invoice as paid. POST /documents/invoice/{documentId}/pay. date is a Unix timestamp in seconds"
    )]
    async fn holded_invoices_pay(
        &self,
        params: Parameters<PayInvoiceParams>,
    ) -> Result<CallToolResult, McpError> {
        let (document_id, payment) = params.0.into_payment();
        tool_result(invoices::pay_invoice(&self.client, &document_id, &payment).await)
    }

    /// Sends an invoice by e-mail.
    #[tool(
        description = "Send an invoice by e-mail. POST /documents/invoice/{documentId}/send. emails is a comma-separated list"
    )]
    async fn holded_invoices_send(
        &self,
        params: Parameters<SendInvoiceParams>,
    ) -> Result<CallToolResult, McpError> {
        let (document_id, delivery) = params.0.into_delivery();
        tool_result(invoices::send_invoice(&self.client, &document_id, &delivery).await)
    }
}

#[tool_handler]
impl ServerHandler for HoldedMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Holded invoicing MCP server. \
                 List, read, create, update, approve, pay, e-mail and delete \
                 invoices, or fetch their PDF rendition."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
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
    use std::collections::BTreeSet;

    use rmcp::handler::server::wrapper::Parameters;
    use serde_json::{Value, json};

    use super::HoldedMcpServer;
    use crate::params::{
        ApproveInvoiceParams, CreateInvoiceParams, DocumentParams, ListInvoicesParams,
        PayInvoiceParams,
    };
    use crate::test_support::MockHolded;

    fn document(id: &str) -> Parameters<DocumentParams> {
        Parameters(DocumentParams {
            document_id: id.to_owned(),
        })
    }

    #[test]
    fn every_operation_is_registered_as_a_tool() {
        let names: BTreeSet<String> = HoldedMcpServer::tool_router()
            .list_all()
            .into_iter()
            .map(|tool| tool.name.into_owned())
            .collect();
        let expected: BTreeSet<String> = [
            "holded_invoices_list",
            "holded_invoices_get",
            "holded_invoices_create",
            "holded_invoices_update",
            "holded_invoices_approve",
            "holded_invoices_delete",
            "holded_invoices_pay",
            "holded_invoices_send",
            "holded_invoices_pdf",
        ]
        .into_iter()
        .map(str::to_owned)
        .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn list_tool_schema_uses_camel_case() {
        let tool = HoldedMcpServer::tool_router()
            .list_all()
            .into_iter()
            .find(|candidate| candidate.name == "holded_invoices_list")
            .expect("list tool registered");
        let properties = tool
            .input_schema
            .get("properties")
            .and_then(Value::as_object)
            .expect("schema has properties");
        assert!(properties.contains_key("dateFrom"));
        assert!(properties.contains_key("updatedTo"));
        assert!(!properties.contains_key("date_from"));
    }

    #[tokio::test]
    async fn object_results_are_structured() {
        let mock = MockHolded::json(200, &json!({ "id": "inv-1", "total": 121.0_f64 })).await;
        let server = HoldedMcpServer::new(mock.client());
        let result = server
            .holded_invoices_get(document("inv-1"))
            .await
            .expect("tool call succeeds");
        assert_ne!(result.is_error, Some(true));
        assert_eq!(
            result.structured_content,
            Some(json!({ "id": "inv-1", "total": 121.0_f64 }))
        );
    }

    #[tokio::test]
    async fn list_tool_wraps_items() {
        let mock = MockHolded::json(200, &json!([{ "id": "a" }])).await;
        let server = HoldedMcpServer::new(mock.client());
        let result = server
            .holded_invoices_list(Parameters(ListInvoicesParams::default()))
            .await
            .expect("tool call succeeds");
        assert_eq!(
            result.structured_content,
            Some(json!({ "items": [{ "id": "a" }] }))
        );
    }

    #[tokio::test]
    async fn api_failures_become_tool_errors() {
        let mock = MockHolded::start(404, "application/json", "{\"info\":\"Not found\"}").await;
        let server = HoldedMcpServer::new(mock.client());
        let result = server
            .holded_invoices_get(document("gone"))
            .await
            .expect("api failures are not protocol errors");
        assert_eq!(result.is_error, Some(true));
        let report = result.structured_content.expect("structured report");
        assert_eq!(report.get("kind"), Some(&json!("http_status")));
        assert_eq!(report.get("statusCode"), Some(&json!(404_u16)));
        assert_eq!(
            report.get("url"),
            Some(&json!(format!("{}/documents/invoice/gone", mock.base_url())))
        );
    }

    #[tokio::test]
    async fn bad_input_is_a_protocol_error_and_skips_the_api() {
        let mock = MockHolded::json(200, &json!({})).await;
        let server = HoldedMcpServer::new(mock.client());

        let bad_date = ListInvoicesParams {
            date_from: Some("yesterday".to_owned()),
            ..ListInvoicesParams::default()
        };
        let _list_err = server
            .holded_invoices_list(Parameters(bad_date))
            .await
            .expect_err("bad date is rejected");

        let _id_err = server
            .holded_invoices_delete(document(""))
            .await
            .expect_err("empty id is rejected");

        let _pay_err = server
            .holded_invoices_pay(Parameters(PayInvoiceParams {
                document_id: "inv".to_owned(),
                date: 0,
                amount: f64::INFINITY,
                treasury: None,
                desc: None,
            }))
            .await
            .expect_err("infinite amount is rejected");

        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn create_and_approve_reach_their_endpoints() {
        let mock = MockHolded::json(200, &json!({ "status": 1_i64, "id": "x" })).await;
        let server = HoldedMcpServer::new(mock.client());

        let payload = json!({ "contactName": "ACME" })
            .as_object()
            .cloned()
            .expect("object");
        let _created = server
            .holded_invoices_create(Parameters(CreateInvoiceParams { payload }))
            .await
            .expect("create succeeds");
        let _approved = server
            .holded_invoices_approve(Parameters(ApproveInvoiceParams {
                document_id: "x".to_owned(),
                info: Some("note".to_owned()),
            }))
            .await
            .expect("approve succeeds");

        let paths: Vec<String> = mock
            .requests()
            .into_iter()
            .map(|request| request.path)
            .collect();
        assert_eq!(
            paths,
            vec![
                "/documents/invoice".to_owned(),
                "/doc/invoice/x/draftmode/approve".to_owned(),
            ]
        );
    }
}
