//! Invoice operations: one function per Holded endpoint.
//!
//! Each operation maps typed parameters onto a single
//! [`HoldedClient::execute`] call. Document payloads are opaque JSON objects
//! and are forwarded exactly as supplied.

use chrono::NaiveDate;
use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::client::{HoldedClient, QueryParams};
use crate::date_filter::filter_by_date_range;
use crate::error::{HoldedError, ValidationError};

/// Collection path for invoice documents.
const INVOICES_PATH: &str = "/documents/invoice";

/// Filters accepted by [`list_invoices`]. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListInvoicesQuery {
    /// Holded document status (e.g. 0 draft, 1 pending, 2 approved).
    pub status: Option<i64>,
    /// Restrict to (or exclude) current invoices.
    pub current: Option<bool>,
    /// Issue date lower bound, inclusive.
    pub date_from: Option<NaiveDate>,
    /// Issue date upper bound, inclusive.
    pub date_to: Option<NaiveDate>,
    /// Last-update lower bound.
    pub updated_from: Option<NaiveDate>,
    /// Last-update upper bound.
    pub updated_to: Option<NaiveDate>,
    /// Sort field.
    pub sort: Option<String>,
    /// Sort direction.
    pub order: Option<String>,
    /// Page size.
    pub limit: Option<u64>,
    /// Page offset.
    pub offset: Option<u64>,
}

impl ListInvoicesQuery {
    /// Query string for the list endpoint, using Holded's parameter names.
    #[must_use]
    pub fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.push("status", self.status);
        params.push("current", self.current);
        params.push("dateFrom", self.date_from);
        params.push("dateTo", self.date_to);
        params.push("updatedFrom", self.updated_from);
        params.push("updatedTo", self.updated_to);
        params.push("sort", self.sort.as_deref());
        params.push("order", self.order.as_deref());
        params.push("limit", self.limit);
        params.push("offset", self.offset);
        params
    }
}

/// Body of a payment registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payment {
    /// Payment date as Unix seconds.
    pub date: i64,
    /// Amount paid.
    pub amount: f64,
    /// Treasury account id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treasury: Option<String>,
    /// Free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

/// Body of an e-mail delivery request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDelivery {
    /// Comma-separated recipient addresses.
    pub emails: String,
    /// Mail subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Mail body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Holded mail template id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_template_id: Option<String>,
    /// Additional document ids to attach.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_ids: Option<String>,
}

/// Accepts `value` as a document payload only if it is a JSON object.
///
/// # Errors
///
/// Returns a [`ValidationError`] for arrays, strings, numbers, booleans and `null`.
pub fn payload_object(value: Value) -> Result<Map<String, Value>, ValidationError> {
    if let Value::Object(map) = value {
        Ok(map)
    } else {
        Err(ValidationError::new("Payload must be a JSON object"))
    }
}

/// Rejects ids that would not form a single path segment.
///
/// URL parsing treats `\` like `/` and resolves `.`, `..` and their
/// percent-encoded forms as dot segments, so those are refused as well.
fn checked_id(document_id: &str) -> Result<&str, ValidationError> {
    let trimmed = document_id.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("Document id must not be empty"));
    }
    if trimmed.contains(['/', '\\', '?', '#', '%']) {
        return Err(ValidationError::new(
            "Document id must not contain '/', '\\', '?', '#' or '%'",
        ));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(ValidationError::new("Document id must not be '.' or '..'"));
    }
    Ok(trimmed)
}

/// Path of one invoice, optionally followed by a sub-resource.
fn invoice_path(document_id: &str, suffix: &str) -> Result<String, ValidationError> {
    Ok(format!("{INVOICES_PATH}/{}{suffix}", checked_id(document_id)?))
}

/// Serializes a typed request body.
fn body_of<T: Serialize>(body: &T) -> Result<Value, ValidationError> {
    serde_json::to_value(body)
        .map_err(|err| ValidationError::new(&format!("Invalid request body: {err}")))
}

/// Lists invoices, wrapping the result as `{"items": ...}`.
///
/// When the API returns an array it is filtered again on
/// [`ListInvoicesQuery::date_from`] / [`ListInvoicesQuery::date_to`].
///
/// # Errors
///
/// Propagates any [`TransportError`](crate::error::TransportError).
pub async fn list_invoices(
    client: &HoldedClient,
    query: &ListInvoicesQuery,
) -> Result<Value, HoldedError> {
    let params = query.query_params();
    let value = client
        .execute(Method::GET, INVOICES_PATH, Some(&params), None)
        .await?;
    let items = if let Value::Array(documents) = value {
        Value::Array(filter_by_date_range(
            documents,
            query.date_from,
            query.date_to,
        ))
    } else {
        value
    };
    Ok(json!({ "items": items }))
}

/// Fetches one invoice.
///
/// # Errors
///
/// Rejects malformed ids, otherwise propagates transport failures.
pub async fn get_invoice(client: &HoldedClient, document_id: &str) -> Result<Value, HoldedError> {
    let path = invoice_path(document_id, "")?;
    Ok(client.execute(Method::GET, &path, None, None).await?)
}

/// Creates an invoice from a caller-supplied document.
///
/// # Errors
///
/// Propagates transport failures, including the API's own validation (4xx).
pub async fn create_invoice(
    client: &HoldedClient,
    payload: &Map<String, Value>,
) -> Result<Value, HoldedError> {
    let body = Value::Object(payload.clone());
    Ok(client
        .execute(Method::POST, INVOICES_PATH, None, Some(&body))
        .await?)
}

/// Replaces fields of an invoice with a caller-supplied document.
///
/// # Errors
///
/// Rejects malformed ids, otherwise propagates transport failures.
pub async fn update_invoice(
    client: &HoldedClient,
    document_id: &str,
    payload: &Map<String, Value>,
) -> Result<Value, HoldedError> {
    let path = invoice_path(document_id, "")?;
    let body = Value::Object(payload.clone());
    Ok(client.execute(Method::PUT, &path, None, Some(&body)).await?)
}

/// Approves (numbers) a draft invoice.
///
/// `_info` is accepted for forward compatibility and is not transmitted.
///
/// # Errors
///
/// Rejects malformed ids, otherwise propagates transport failures.
pub async fn approve_invoice(
    client: &HoldedClient,
    document_id: &str,
    _info: Option<&str>,
) -> Result<Value, HoldedError> {
    let path = format!("/doc/invoice/{}/draftmode/approve", checked_id(document_id)?);
    Ok(client.execute(Method::POST, &path, None, None).await?)
}

/// Deletes an invoice.
///
/// # Errors
///
/// Rejects malformed ids, otherwise propagates transport failures.
pub async fn delete_invoice(
    client: &HoldedClient,
    document_id: &str,
) -> Result<Value, HoldedError> {
    let path = invoice_path(document_id, "")?;
    Ok(client.execute(Method::DELETE, &path, None, None).await?)
}

/// Registers a payment against an invoice.
///
/// # Errors
///
/// Rejects malformed ids and non-finite amounts, otherwise propagates
/// transport failures.
pub async fn pay_invoice(
    client: &HoldedClient,
    document_id: &str,
    payment: &Payment,
) -> Result<Value, HoldedError> {
    if !payment.amount.is_finite() {
        return Err(ValidationError::new("Payment amount must be a finite number").into());
    }
    let path = invoice_path(document_id, "/pay")?;
    let body = body_of(payment)?;
    Ok(client.execute(Method::POST, &path, None, Some(&body)).await?)
}

/// Sends an invoice by e-mail.
///
/// # Errors
///
/// Rejects malformed ids and an empty recipient list, otherwise propagates
/// transport failures.
pub async fn send_invoice(
    client: &HoldedClient,
    document_id: &str,
    delivery: &EmailDelivery,
) -> Result<Value, HoldedError> {
    if delivery.emails.trim().is_empty() {
        return Err(ValidationError::new("At least one e-mail address is required").into());
    }
    let path = invoice_path(document_id, "/send")?;
    let body = body_of(delivery)?;
    Ok(client.execute(Method::POST, &path, None, Some(&body)).await?)
}

/// Fetches the PDF rendition of an invoice (base64 inside a JSON envelope).
///
/// # Errors
///
/// Rejects malformed ids, otherwise propagates transport failures.
pub async fn invoice_pdf(client: &HoldedClient, document_id: &str) -> Result<Value, HoldedError> {
    let path = invoice_path(document_id, "/pdf")?;
    Ok(client.execute(Method::GET, &path, None, None).await?)
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::panic,
    clippy::missing_docs_in_private_items,
    reason = "test code uses expect and panic for readability"
)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    use super::{
        EmailDelivery, ListInvoicesQuery, Payment, approve_invoice, create_invoice,
        delete_invoice, get_invoice, invoice_pdf, list_invoices, pay_invoice, payload_object,
        send_invoice, update_invoice,
    };
    use crate::error::{HoldedError, TransportErrorKind};
    use crate::test_support::MockHolded;

    fn day(year: i32, month: u32, date: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, date).expect("valid date for test")
    }

    fn noon_utc(year: i32, month: u32, date: u32) -> i64 {
        day(year, month, date)
            .and_hms_opt(12, 0, 0)
            .expect("valid time for test")
            .and_utc()
            .timestamp()
    }

    fn object(value: Value) -> serde_json::Map<String, Value> {
        payload_object(value).expect("object payload")
    }

    #[test]
    fn empty_list_query_sends_nothing() {
        assert!(ListInvoicesQuery::default().query_params().is_empty());
    }

    #[test]
    fn list_query_uses_holded_names_and_skips_absent_values() {
        let query = ListInvoicesQuery {
            status: Some(1),
            current: Some(false),
            date_from: Some(day(2024, 1, 10)),
            limit: Some(25),
            ..ListInvoicesQuery::default()
        };
        let params = query.query_params();
        let names: Vec<&str> = params.pairs().iter().map(|pair| pair.0).collect();
        assert_eq!(names, vec!["status", "current", "dateFrom", "limit"]);
        assert!(params.pairs().iter().all(|pair| pair.1 != "null" && !pair.1.is_empty()));
    }

    #[test]
    fn non_object_payloads_are_rejected() {
        for value in [json!([1_i64, 2_i64]), json!("text"), json!(null), json!(3_i64)] {
            let err = payload_object(value).expect_err("non-object payload");
            assert!(err.to_string().contains("JSON object"));
        }
    }

    #[tokio::test]
    async fn list_filters_and_wraps_arrays() {
        let body = json!([
            { "id": "a", "date": noon_utc(2024, 1, 1) },
            { "id": "b", "date": noon_utc(2024, 1, 15) },
            { "id": "c", "date": noon_utc(2024, 2, 1) },
        ]);
        let mock = MockHolded::json(200, &body).await;
        let query = ListInvoicesQuery {
            date_from: Some(day(2024, 1, 10)),
            date_to: Some(day(2024, 1, 31)),
            ..ListInvoicesQuery::default()
        };
        let result = list_invoices(&mock.client(), &query)
            .await
            .expect("list succeeds");
        assert_eq!(
            result,
            json!({ "items": [{ "id": "b", "date": noon_utc(2024, 1, 15) }] })
        );

        let request = mock.last_request();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/documents/invoice");
        assert_eq!(
            request.query_pairs(),
            vec![
                ("dateFrom".to_owned(), "2024-01-10".to_owned()),
                ("dateTo".to_owned(), "2024-01-31".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn list_without_range_returns_everything() {
        let body = json!([{ "id": "no-date" }, "odd"]);
        let mock = MockHolded::json(200, &body).await;
        let result = list_invoices(&mock.client(), &ListInvoicesQuery::default())
            .await
            .expect("list succeeds");
        assert_eq!(result, json!({ "items": body }));
        assert!(mock.last_request().query.is_none());
    }

    #[tokio::test]
    async fn list_wraps_non_array_values_untouched() {
        let body = json!({ "status": 0_i64, "info": "no documents" });
        let mock = MockHolded::json(200, &body).await;
        let query = ListInvoicesQuery {
            date_from: Some(day(2024, 1, 1)),
            ..ListInvoicesQuery::default()
        };
        let result = list_invoices(&mock.client(), &query)
            .await
            .expect("list succeeds");
        assert_eq!(result, json!({ "items": body }));
    }

    #[tokio::test]
    async fn get_surfaces_not_found() {
        let mock = MockHolded::start(404, "application/json", "{\"info\":\"Not found\"}").await;
        let err = get_invoice(&mock.client(), "missing")
            .await
            .expect_err("404 must fail");
        let HoldedError::Transport(transport) = err else {
            panic!("expected a transport error");
        };
        assert_eq!(transport.kind(), TransportErrorKind::HttpStatus);
        assert_eq!(transport.status_code(), Some(404));
        assert_eq!(
            transport.url(),
            Some(format!("{}/documents/invoice/missing", mock.base_url()).as_str())
        );
    }

    #[tokio::test]
    async fn create_forwards_payload_verbatim() {
        let mock = MockHolded::json(200, &json!({ "status": 1_i64, "id": "new" })).await;
        let payload = object(json!({
            "contactId": "c-1",
            "date": 1_704_067_200_i64,
            "items": [{ "name": "Consulting", "units": 2_i64, "subtotal": 150.0_f64 }],
            "customFields": [],
        }));
        let result = create_invoice(&mock.client(), &payload)
            .await
            .expect("create succeeds");
        assert_eq!(result, json!({ "status": 1_i64, "id": "new" }));

        let request = mock.last_request();
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/documents/invoice");
        assert_eq!(request.json_body(), Some(Value::Object(payload)));
        assert!(request.body.starts_with("{\"contactId\""));
    }

    #[tokio::test]
    async fn update_uses_put_on_the_document() {
        let mock = MockHolded::json(200, &json!({ "status": 1_i64 })).await;
        let payload = object(json!({ "notes": "updated" }));
        let _result = update_invoice(&mock.client(), "inv-9", &payload)
            .await
            .expect("update succeeds");
        let request = mock.last_request();
        assert_eq!(request.method, "PUT");
        assert_eq!(request.path, "/documents/invoice/inv-9");
        assert_eq!(request.json_body(), Some(json!({ "notes": "updated" })));
    }

    #[tokio::test]
    async fn approve_posts_without_body_and_ignores_info() {
        let mock = MockHolded::json(200, &json!({ "status": 1_i64 })).await;
        let _result = approve_invoice(&mock.client(), "inv-3", Some("ignored"))
            .await
            .expect("approve succeeds");
        let request = mock.last_request();
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/doc/invoice/inv-3/draftmode/approve");
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn delete_uses_delete_method() {
        let mock = MockHolded::json(200, &json!({ "status": 1_i64 })).await;
        let _result = delete_invoice(&mock.client(), "inv-4")
            .await
            .expect("delete succeeds");
        let request = mock.last_request();
        assert_eq!(request.method, "DELETE");
        assert_eq!(request.path, "/documents/invoice/inv-4");
    }

    #[tokio::test]
    async fn payment_body_contains_only_given_fields() {
        let mock = MockHolded::json(200, &json!({ "status": 1_i64 })).await;
        let payment = Payment {
            date: 1_704_067_200,
            amount: 121.0,
            treasury: None,
            desc: None,
        };
        let _result = pay_invoice(&mock.client(), "inv-5", &payment)
            .await
            .expect("pay succeeds");
        let request = mock.last_request();
        assert_eq!(request.path, "/documents/invoice/inv-5/pay");
        assert_eq!(
            request.json_body(),
            Some(json!({ "date": 1_704_067_200_i64, "amount": 121.0_f64 }))
        );
    }

    #[tokio::test]
    async fn payment_body_includes_optional_fields_when_set() {
        let mock = MockHolded::json(200, &json!({ "status": 1_i64 })).await;
        let payment = Payment {
            date: 1_704_067_200,
            amount: 50.5,
            treasury: Some("t-1".to_owned()),
            desc: Some("partial".to_owned()),
        };
        let _result = pay_invoice(&mock.client(), "inv-5", &payment)
            .await
            .expect("pay succeeds");
        assert_eq!(
            mock.last_request().json_body(),
            Some(json!({
                "date": 1_704_067_200_i64,
                "amount": 50.5_f64,
                "treasury": "t-1",
                "desc": "partial",
            }))
        );
    }

    #[tokio::test]
    async fn send_uses_holded_field_names() {
        let mock = MockHolded::json(200, &json!({ "status": 1_i64 })).await;
        let delivery = EmailDelivery {
            emails: "a@example.com,b@example.com".to_owned(),
            subject: Some("Your invoice".to_owned()),
            message: None,
            mail_template_id: Some("tpl-1".to_owned()),
            doc_ids: None,
        };
        let _result = send_invoice(&mock.client(), "inv-6", &delivery)
            .await
            .expect("send succeeds");
        let request = mock.last_request();
        assert_eq!(request.path, "/documents/invoice/inv-6/send");
        assert_eq!(
            request.json_body(),
            Some(json!({
                "emails": "a@example.com,b@example.com",
                "subject": "Your invoice",
                "mailTemplateId": "tpl-1",
            }))
        );
    }

    #[tokio::test]
    async fn pdf_fetches_the_rendition() {
        let body = json!({ "status": 1_i64, "data": "JVBERi0xLjQK" });
        let mock = MockHolded::json(200, &body).await;
        let result = invoice_pdf(&mock.client(), "inv-7")
            .await
            .expect("pdf succeeds");
        assert_eq!(result, body);
        assert_eq!(mock.last_request().path, "/documents/invoice/inv-7/pdf");
    }

    #[tokio::test]
    async fn malformed_input_fails_before_any_call() {
        let mock = MockHolded::json(200, &json!({})).await;
        let client = mock.client();

        let empty_id = get_invoice(&client, "  ").await.expect_err("empty id");
        assert!(empty_id.is_validation());

        let nested = delete_invoice(&client, "a/b").await.expect_err("nested id");
        assert!(nested.is_validation());

        for id in ["..", ".", " .. ", "a\\b", "%2e%2e", "x?y", "x#y"] {
            let err = delete_invoice(&client, id)
                .await
                .expect_err("id escaping its path segment");
            assert!(err.is_validation(), "{id} should be rejected locally");
        }
        let pdf_err = invoice_pdf(&client, ".").await.expect_err("dot id");
        assert!(pdf_err.is_validation());
        let get_err = get_invoice(&client, "a\\b").await.expect_err("backslash id");
        assert!(get_err.is_validation());
        let approve_err = approve_invoice(&client, "..", None)
            .await
            .expect_err("dot-dot id");
        assert!(approve_err.is_validation());

        let payment = Payment {
            date: 0,
            amount: f64::NAN,
            treasury: None,
            desc: None,
        };
        let bad_amount = pay_invoice(&client, "inv", &payment)
            .await
            .expect_err("nan amount");
        assert!(bad_amount.is_validation());

        let delivery = EmailDelivery {
            emails: String::new(),
            subject: None,
            message: None,
            mail_template_id: None,
            doc_ids: None,
        };
        let no_recipients = send_invoice(&client, "inv", &delivery)
            .await
            .expect_err("no recipients");
        assert!(no_recipients.is_validation());

        assert!(mock.requests().is_empty());
    }
}
