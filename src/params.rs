//! Parameter structs for MCP tool inputs.
//!
//! Each struct derives [`serde::Deserialize`] and [`schemars::JsonSchema`]
//! so that `rmcp` can auto-generate JSON schemas for tool parameters.
//! Field names are exposed in camelCase (`documentId`, `dateFrom`, ...).

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::invoices::{EmailDelivery, ListInvoicesQuery, Payment};

/// Parses an optional `YYYY-MM-DD` date supplied as `field`.
fn parse_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, ValidationError> {
    raw.map(|text| {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|err| {
            ValidationError::new(&format!("invalid {field} '{text}': {err} (expected YYYY-MM-DD)"))
        })
    })
    .transpose()
}

/// Parameters for the `holded_invoices_list` tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListInvoicesParams {
    /// Holded status code (0 draft, 1 pending, 2 approved).
    pub(crate) status: Option<i64>,
    /// Only current invoices (`true`) or exclude them (`false`).
    pub(crate) current: Option<bool>,
    /// Issue date lower bound (inclusive), format `YYYY-MM-DD`.
    pub(crate) date_from: Option<String>,
    /// Issue date upper bound (inclusive), format `YYYY-MM-DD`.
    pub(crate) date_to: Option<String>,
    /// Last-update lower bound, format `YYYY-MM-DD`.
    pub(crate) updated_from: Option<String>,
    /// Last-update upper bound, format `YYYY-MM-DD`.
    pub(crate) updated_to: Option<String>,
    /// Sort field.
    pub(crate) sort: Option<String>,
    /// Sort direction.
    pub(crate) order: Option<String>,
    /// Maximum number of invoices to return.
    pub(crate) limit: Option<u64>,
    /// Number of invoices to skip.
    pub(crate) offset: Option<u64>,
}

impl ListInvoicesParams {
    /// Converts tool input into a typed list query.
    pub(crate) fn into_query(self) -> Result<ListInvoicesQuery, ValidationError> {
        Ok(ListInvoicesQuery {
            status: self.status,
            current: self.current,
            date_from: parse_date("dateFrom", self.date_from.as_deref())?,
            date_to: parse_date("dateTo", self.date_to.as_deref())?,
            updated_from: parse_date("updatedFrom", self.updated_from.as_deref())?,
            updated_to: parse_date("updatedTo", self.updated_to.as_deref())?,
            sort: self.sort,
            order: self.order,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// Parameters for tools addressing a single invoice.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentParams {
    /// Holded invoice document id.
    pub(crate) document_id: String,
}

/// Parameters for the `holded_invoices_create` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub(crate) struct CreateInvoiceParams {
    /// Holded invoice document (contactId/contactName, date, items, ...), sent as-is.
    pub(crate) payload: Map<String, Value>,
}

/// Parameters for the `holded_invoices_update` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateInvoiceParams {
    /// Holded invoice document id.
    pub(crate) document_id: String,
    /// Fields to update (desc, notes, date, items, customFields, ...), sent as-is.
    pub(crate) payload: Map<String, Value>,
}

/// Parameters for the `holded_invoices_approve` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApproveInvoiceParams {
    /// Holded invoice document id.
    pub(crate) document_id: String,
    /// Informational note; accepted but not sent to Holded.
    pub(crate) info: Option<String>,
}

/// Parameters for the `holded_invoices_pay` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PayInvoiceParams {
    /// Holded invoice document id.
    pub(crate) document_id: String,
    /// Payment date as a Unix timestamp in seconds.
    pub(crate) date: i64,
    /// Amount paid.
    pub(crate) amount: f64,
    /// Treasury account id.
    pub(crate) treasury: Option<String>,
    /// Payment description.
    pub(crate) desc: Option<String>,
}

impl PayInvoiceParams {
    /// Splits tool input into the document id and the payment body.
    pub(crate) fn into_payment(self) -> (String, Payment) {
        (
            self.document_id,
            Payment {
                date: self.date,
                amount: self.amount,
                treasury: self.treasury,
                desc: self.desc,
            },
        )
    }
}

/// Parameters for the `holded_invoices_send` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendInvoiceParams {
    /// Holded invoice document id.
    pub(crate) document_id: String,
    /// Comma-separated recipient e-mails.
    pub(crate) emails: String,
    /// E-mail subject.
    pub(crate) subject: Option<String>,
    /// E-mail message.
    pub(crate) message: Option<String>,
    /// Holded mail template id.
    pub(crate) mail_template_id: Option<String>,
    /// Additional document ids.
    pub(crate) doc_ids: Option<String>,
}

impl SendInvoiceParams {
    /// Splits tool input into the document id and the delivery body.
    pub(crate) fn into_delivery(self) -> (String, EmailDelivery) {
        (
            self.document_id,
            EmailDelivery {
                emails: self.emails,
                subject: self.subject,
                message: self.message,
                mail_template_id: self.mail_template_id,
                doc_ids: self.doc_ids,
            },
        )
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "test code uses expect for readability"
)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        ApproveInvoiceParams, CreateInvoiceParams, DocumentParams, ListInvoicesParams,
        PayInvoiceParams, SendInvoiceParams, UpdateInvoiceParams,
    };

    #[test]
    fn list_minimal() {
        let params: ListInvoicesParams =
            serde_json::from_str("{}").expect("should deserialize empty");
        let query = params.into_query().expect("empty query is valid");
        assert!(query.query_params().is_empty());
    }

    #[test]
    fn list_full_uses_camel_case_names() {
        let json = r#"{
            "status": 1,
            "current": true,
            "dateFrom": "2024-01-01",
            "dateTo": "2024-12-31",
            "updatedFrom": "2024-06-01",
            "updatedTo": "2024-06-30",
            "sort": "date",
            "order": "desc",
            "limit": 50,
            "offset": 100
        }"#;
        let params: ListInvoicesParams =
            serde_json::from_str(json).expect("should deserialize full params");
        let query = params.into_query().expect("valid query");
        assert_eq!(query.status, Some(1));
        assert_eq!(query.current, Some(true));
        assert_eq!(query.date_from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(query.date_to, NaiveDate::from_ymd_opt(2024, 12, 31));
        assert_eq!(query.updated_from, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(query.updated_to, NaiveDate::from_ymd_opt(2024, 6, 30));
        assert_eq!(query.sort.as_deref(), Some("date"));
        assert_eq!(query.order.as_deref(), Some("desc"));
        assert_eq!(query.limit, Some(50));
        assert_eq!(query.offset, Some(100));
    }

    #[test]
    fn list_rejects_malformed_dates() {
        let params: ListInvoicesParams =
            serde_json::from_str(r#"{"dateTo": "31/01/2024"}"#).expect("should deserialize");
        let err = params.into_query().expect_err("bad date must fail");
        assert!(err.to_string().contains("dateTo"));
    }

    #[test]
    fn document_params() {
        let params: DocumentParams =
            serde_json::from_str(r#"{"documentId": "inv-1"}"#).expect("should deserialize");
        assert_eq!(params.document_id, "inv-1");
    }

    #[test]
    fn create_requires_an_object_payload() {
        let ok: CreateInvoiceParams =
            serde_json::from_str(r#"{"payload": {"contactId": "c-1"}}"#).expect("object payload");
        assert!(ok.payload.contains_key("contactId"));

        let _array_err = serde_json::from_str::<CreateInvoiceParams>(r#"{"payload": [1, 2]}"#)
            .expect_err("array payload must fail");
        let _text_err = serde_json::from_str::<CreateInvoiceParams>(r#"{"payload": "x"}"#)
            .expect_err("string payload must fail");
    }

    #[test]
    fn update_params() {
        let params: UpdateInvoiceParams =
            serde_json::from_str(r#"{"documentId": "inv-2", "payload": {"notes": "n"}}"#)
                .expect("should deserialize");
        assert_eq!(params.document_id, "inv-2");
        assert_eq!(params.payload.len(), 1);
    }

    #[test]
    fn approve_info_is_optional() {
        let params: ApproveInvoiceParams =
            serde_json::from_str(r#"{"documentId": "inv-3"}"#).expect("should deserialize");
        assert!(params.info.is_none());
    }

    #[test]
    fn pay_minimal() {
        let params: PayInvoiceParams = serde_json::from_str(
            r#"{"documentId": "inv-4", "date": 1704067200, "amount": 99.5}"#,
        )
        .expect("should deserialize");
        let (id, payment) = params.into_payment();
        assert_eq!(id, "inv-4");
        assert_eq!(payment.date, 1_704_067_200);
        assert!((payment.amount - 99.5).abs() < f64::EPSILON);
        assert!(payment.treasury.is_none());
        assert!(payment.desc.is_none());
    }

    #[test]
    fn send_params_map_template_and_doc_ids() {
        let params: SendInvoiceParams = serde_json::from_str(
            r#"{
                "documentId": "inv-5",
                "emails": "a@example.com",
                "mailTemplateId": "tpl",
                "docIds": "d1,d2"
            }"#,
        )
        .expect("should deserialize");
        let (id, delivery) = params.into_delivery();
        assert_eq!(id, "inv-5");
        assert_eq!(delivery.emails, "a@example.com");
        assert_eq!(delivery.mail_template_id.as_deref(), Some("tpl"));
        assert_eq!(delivery.doc_ids.as_deref(), Some("d1,d2"));
        assert!(delivery.subject.is_none());
    }
}
