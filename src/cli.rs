//! Command invocation surface (`holded-cli`).
//!
//! One sub-command per invoice operation. Results are printed as pretty JSON
//! on stdout; failures go to stderr with exit code 2 for caller mistakes and
//! 1 for API failures.

use std::io::{self, Read, Write};

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::client::HoldedClient;
use crate::config::{ConfigError, Settings};
use crate::error::{HoldedError, ValidationError};
use crate::invoices::{self, EmailDelivery, ListInvoicesQuery, Payment};

/// Parses a `YYYY-MM-DD` date argument.
fn parse_day(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
}

/// Holded invoicing CLI
#[derive(Parser, Debug)]
#[command(name = "holded-cli", version, about)]
pub struct Cli {
    /// Operation to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Invoice operations.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List invoices
    List(ListArgs),
    /// Get invoice by id
    Get(DocumentArgs),
    /// Create invoice
    Create(CreateArgs),
    /// Update invoice
    Update(UpdateArgs),
    /// Approve invoice
    Approve(DocumentArgs),
    /// Delete invoice
    Delete(DocumentArgs),
    /// Mark invoice as paid
    Pay(PayArgs),
    /// Send invoice via email
    Send(SendArgs),
    /// Get invoice PDF (base64)
    Pdf(DocumentArgs),
}

impl Command {
    /// Sub-command name, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match *self {
            Self::List(_) => "list",
            Self::Get(_) => "get",
            Self::Create(_) => "create",
            Self::Update(_) => "update",
            Self::Approve(_) => "approve",
            Self::Delete(_) => "delete",
            Self::Pay(_) => "pay",
            Self::Send(_) => "send",
            Self::Pdf(_) => "pdf",
        }
    }
}

/// Arguments for the `list` sub-command.
#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Invoice status
    #[arg(long)]
    pub status: Option<i64>,

    /// Only current invoices
    #[arg(long, conflicts_with = "no_current")]
    pub current: bool,

    /// Exclude current invoices
    #[arg(long)]
    pub no_current: bool,

    /// Filter by date from (YYYY-MM-DD)
    #[arg(long, value_parser = parse_day)]
    pub date_from: Option<NaiveDate>,

    /// Filter by date to (YYYY-MM-DD)
    #[arg(long, value_parser = parse_day)]
    pub date_to: Option<NaiveDate>,

    /// Filter by updated from (YYYY-MM-DD)
    #[arg(long, value_parser = parse_day)]
    pub updated_from: Option<NaiveDate>,

    /// Filter by updated to (YYYY-MM-DD)
    #[arg(long, value_parser = parse_day)]
    pub updated_to: Option<NaiveDate>,

    /// Sort field
    #[arg(long)]
    pub sort: Option<String>,

    /// Order direction
    #[arg(long)]
    pub order: Option<String>,

    /// Limit results
    #[arg(long)]
    pub limit: Option<u64>,

    /// Offset results
    #[arg(long)]
    pub offset: Option<u64>,
}

impl ListArgs {
    /// Tri-state `current` filter: flag given, negated, or absent.
    #[must_use]
    pub const fn current_filter(&self) -> Option<bool> {
        match (self.current, self.no_current) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }

    /// Converts the arguments into a list query.
    #[must_use]
    pub fn into_query(self) -> ListInvoicesQuery {
        ListInvoicesQuery {
            status: self.status,
            current: self.current_filter(),
            date_from: self.date_from,
            date_to: self.date_to,
            updated_from: self.updated_from,
            updated_to: self.updated_to,
            sort: self.sort,
            order: self.order,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Arguments for sub-commands addressing one invoice.
#[derive(Args, Debug)]
pub struct DocumentArgs {
    /// Invoice document id
    pub document_id: String,
}

/// Arguments for the `create` sub-command.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// JSON payload, @file, or '-' for stdin
    #[arg(long)]
    pub payload: String,
}

/// Arguments for the `update` sub-command.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Invoice document id
    pub document_id: String,

    /// JSON payload, @file, or '-' for stdin
    #[arg(long)]
    pub payload: String,
}

/// Arguments for the `pay` sub-command.
#[derive(Args, Debug)]
pub struct PayArgs {
    /// Invoice document id
    pub document_id: String,

    /// Unix timestamp (seconds)
    #[arg(long, allow_negative_numbers = true)]
    pub date: i64,

    /// Amount paid
    #[arg(long, allow_negative_numbers = true)]
    pub amount: f64,

    /// Treasury id
    #[arg(long)]
    pub treasury: Option<String>,

    /// Payment description
    #[arg(long)]
    pub desc: Option<String>,
}

/// Arguments for the `send` sub-command.
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Invoice document id
    pub document_id: String,

    /// Comma-separated emails
    #[arg(long)]
    pub emails: String,

    /// Email subject
    #[arg(long)]
    pub subject: Option<String>,

    /// Email message
    #[arg(long)]
    pub message: Option<String>,

    /// Holded mail template id
    #[arg(long)]
    pub mail_template_id: Option<String>,

    /// Additional doc ids
    #[arg(long)]
    pub doc_ids: Option<String>,
}

/// Failure of a CLI run.
#[derive(Debug, Error)]
pub enum CliError {
    /// The environment did not yield usable settings.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The operation failed.
    #[error(transparent)]
    Operation(#[from] HoldedError),
}

impl CliError {
    /// Process exit code for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match *self {
            Self::Config(_) | Self::Operation(HoldedError::Validation(_)) => 2,
            Self::Operation(HoldedError::Transport(_)) => 1,
        }
    }

    /// Text written to stderr: the multi-line diagnostic for API failures,
    /// the plain message otherwise.
    #[must_use]
    pub fn into_message(self) -> String {
        match self {
            Self::Config(err) => err.to_string(),
            Self::Operation(HoldedError::Validation(err)) => err.to_string(),
            Self::Operation(HoldedError::Transport(err)) => err.diagnostic(),
        }
    }
}

/// Loads a JSON object payload given literally, as `@path`, or as `-` for
/// `stdin`.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the source cannot be read, is not JSON,
/// or is not a JSON object.
pub fn load_payload<R: Read>(source: &str, stdin: R) -> Result<Map<String, Value>, ValidationError> {
    let raw = if source == "-" {
        io::read_to_string(stdin)
            .map_err(|err| ValidationError::new(&format!("Could not read payload from stdin: {err}")))?
    } else if let Some(path) = source.strip_prefix('@') {
        std::fs::read_to_string(path).map_err(|err| {
            ValidationError::new(&format!("Could not read payload file '{path}': {err}"))
        })?
    } else {
        source.to_owned()
    };
    let value: Value = serde_json::from_str(&raw)
        .map_err(|err| ValidationError::new(&format!("Invalid JSON payload: {err}")))?;
    invoices::payload_object(value)
}

/// [`load_payload`] on the blocking thread pool, so file and stdin reads
/// never stall a runtime worker.
async fn read_payload<R: Read + Send + 'static>(
    source: String,
    stdin: R,
) -> Result<Map<String, Value>, ValidationError> {
    tokio::task::spawn_blocking(move || load_payload(&source, stdin))
        .await
        .unwrap_or_else(|err| Err(ValidationError::new(&format!("Could not read payload: {err}"))))
}

/// Runs one operation against `client`, reading payloads from `stdin` when
/// requested.
async fn dispatch<R: Read + Send + 'static>(
    client: &HoldedClient,
    command: Command,
    stdin: R,
) -> Result<Value, HoldedError> {
    match command {
        Command::List(args) => invoices::list_invoices(client, &args.into_query()).await,
        Command::Get(args) => invoices::get_invoice(client, &args.document_id).await,
        Command::Create(args) => {
            let payload = read_payload(args.payload, stdin).await?;
            invoices::create_invoice(client, &payload).await
        }
        Command::Update(args) => {
            let payload = read_payload(args.payload, stdin).await?;
            invoices::update_invoice(client, &args.document_id, &payload).await
        }
        Command::Approve(args) => invoices::approve_invoice(client, &args.document_id, None).await,
        Command::Delete(args) => invoices::delete_invoice(client, &args.document_id).await,
        Command::Pay(args) => {
            let payment = Payment {
                date: args.date,
                amount: args.amount,
                treasury: args.treasury,
                desc: args.desc,
            };
            invoices::pay_invoice(client, &args.document_id, &payment).await
        }
        Command::Send(args) => {
            let delivery = EmailDelivery {
                emails: args.emails,
                subject: args.subject,
                message: args.message,
                mail_template_id: args.mail_template_id,
                doc_ids: args.doc_ids,
            };
            invoices::send_invoice(client, &args.document_id, &delivery).await
        }
        Command::Pdf(args) => invoices::invoice_pdf(client, &args.document_id).await,
    }
}

/// Opens a client, runs `command` and closes the client again, whatever the
/// outcome.
///
/// # Errors
///
/// Returns a [`HoldedError`] if the payload is rejected, the client cannot be
/// built, or the API call fails.
pub async fn invoke<R: Read + Send + 'static>(
    settings: &Settings,
    command: Command,
    stdin: R,
) -> Result<Value, HoldedError> {
    let name = command.name();
    tracing::debug!(command = name, "running command");
    let client = HoldedClient::new(settings)?;
    let outcome = dispatch(&client, command, stdin).await;
    client.close();
    if let Err(err) = outcome.as_ref() {
        tracing::debug!(command = name, %err, "command failed");
    }
    outcome
}

/// Writes the outcome to `out` or `err` and returns the exit code.
pub fn report<O: Write, E: Write>(
    outcome: Result<Value, CliError>,
    out: &mut O,
    err: &mut E,
) -> u8 {
    let written = match outcome {
        Ok(value) => serde_json::to_string_pretty(&value)
            .map_err(io::Error::other)
            .and_then(|text| writeln!(out, "{text}"))
            .map(|()| 0),
        Err(failure) => {
            let code = failure.exit_code();
            writeln!(err, "{}", failure.into_message()).map(|()| code)
        }
    };
    written.unwrap_or(1)
}

/// Runs a parsed command line with settings from the environment and the
/// process's standard streams.
pub async fn run(cli: Cli) -> u8 {
    let outcome = match Settings::from_env() {
        Ok(settings) => invoke(&settings, cli.command, io::stdin())
            .await
            .map_err(CliError::from),
        Err(err) => Err(CliError::from(err)),
    };
    report(outcome, &mut io::stdout().lock(), &mut io::stderr().lock())
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    clippy::panic,
    reason = "test code uses expect for readability"
)]
mod tests {
    use chrono::NaiveDate;
    use clap::Parser;
    use serde_json::{Value, json};

    use super::{Cli, CliError, Command, invoke, load_payload, report};
    use crate::config::{ConfigError, Settings};
    use crate::error::{HoldedError, TransportError, ValidationError};
    use crate::test_support::MockHolded;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(args).expect("arguments parse").command
    }

    fn settings_for(mock: &MockHolded) -> Settings {
        Settings::new("test-key", mock.base_url(), 5.0_f64).expect("valid settings")
    }

    fn render(outcome: Result<Value, CliError>) -> (u8, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = report(outcome, &mut out, &mut err);
        (
            code,
            String::from_utf8(out).expect("utf-8 stdout"),
            String::from_utf8(err).expect("utf-8 stderr"),
        )
    }

    #[test]
    fn list_flags_map_to_query() {
        let Command::List(args) = parse(&[
            "holded-cli",
            "list",
            "--status",
            "1",
            "--no-current",
            "--date-from",
            "2024-01-01",
            "--limit",
            "10",
        ]) else {
            panic!("expected list");
        };
        let query = args.into_query();
        assert_eq!(query.status, Some(1));
        assert_eq!(query.current, Some(false));
        assert_eq!(query.date_from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(query.date_to, None);
        assert_eq!(query.limit, Some(10));
    }

    #[test]
    fn current_flag_is_tri_state() {
        let Command::List(plain) = parse(&["holded-cli", "list"]) else {
            panic!("expected list");
        };
        assert_eq!(plain.current_filter(), None);
        let Command::List(only) = parse(&["holded-cli", "list", "--current"]) else {
            panic!("expected list");
        };
        assert_eq!(only.current_filter(), Some(true));
        let _conflict = Cli::try_parse_from(["holded-cli", "list", "--current", "--no-current"])
            .expect_err("flags conflict");
    }

    #[test]
    fn malformed_dates_are_rejected_by_the_parser() {
        let _err = Cli::try_parse_from(["holded-cli", "list", "--date-to", "01/31/2024"])
            .expect_err("bad date");
    }

    #[test]
    fn pay_accepts_negative_amounts() {
        let Command::Pay(args) = parse(&[
            "holded-cli",
            "pay",
            "inv-1",
            "--date",
            "1704067200",
            "--amount",
            "-12.5",
        ]) else {
            panic!("expected pay");
        };
        assert_eq!(args.document_id, "inv-1");
        assert_eq!(args.date, 1_704_067_200);
        assert!((args.amount + 12.5_f64).abs() < f64::EPSILON);
    }

    #[test]
    fn send_requires_emails() {
        let _err = Cli::try_parse_from(["holded-cli", "send", "inv-1"]).expect_err("missing emails");
        let Command::Send(args) = parse(&[
            "holded-cli",
            "send",
            "inv-1",
            "--emails",
            "a@example.com,b@example.com",
            "--mail-template-id",
            "tpl",
        ]) else {
            panic!("expected send");
        };
        assert_eq!(args.emails, "a@example.com,b@example.com");
        assert_eq!(args.mail_template_id.as_deref(), Some("tpl"));
    }

    #[test]
    fn payload_sources() {
        let literal = load_payload(r#"{"contactId":"c-1"}"#, std::io::empty()).expect("literal");
        assert_eq!(literal.get("contactId"), Some(&json!("c-1")));

        let piped = load_payload("-", &b"{\"notes\":\"n\"}"[..]).expect("stdin");
        assert_eq!(piped.get("notes"), Some(&json!("n")));

        let path = std::env::temp_dir().join(format!("holded-cli-payload-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"desc":"from file"}"#).expect("write payload file");
        let source = format!("@{}", path.display());
        let from_file = load_payload(&source, std::io::empty());
        let _removed = std::fs::remove_file(&path);
        assert_eq!(
            from_file.expect("file payload").get("desc"),
            Some(&json!("from file"))
        );
    }

    #[test]
    fn payload_failures_are_validation_errors() {
        let missing = load_payload("@/nonexistent/holded/payload.json", std::io::empty())
            .expect_err("missing file");
        assert!(missing.to_string().contains("Could not read payload file"));

        let garbled = load_payload("{not json", std::io::empty()).expect_err("bad json");
        assert!(garbled.to_string().starts_with("Invalid JSON payload"));

        let array = load_payload("[1, 2]", std::io::empty()).expect_err("array payload");
        assert_eq!(array.to_string(), "Payload must be a JSON object");
    }

    #[test]
    fn success_prints_pretty_json() {
        let (code, out, err) = render(Ok(json!({ "id": "x", "total": 10_i64 })));
        assert_eq!(code, 0);
        assert_eq!(out, "{\n  \"id\": \"x\",\n  \"total\": 10\n}\n");
        assert!(err.is_empty());
    }

    #[test]
    fn failures_map_to_exit_codes() {
        let (validation_code, validation_out, validation_err) = render(Err(CliError::from(
            HoldedError::from(ValidationError::new("Payload must be a JSON object")),
        )));
        assert_eq!(validation_code, 2);
        assert!(validation_out.is_empty());
        assert_eq!(validation_err, "Payload must be a JSON object\n");

        let (config_code, _config_out, config_err) = render(Err(CliError::from(
            ConfigError::MissingApiKey,
        )));
        assert_eq!(config_code, 2);
        assert!(config_err.contains("HOLDED_API_KEY"));

        let header_err = Settings::from_lookup(|name| {
            (name == "HOLDED_API_KEY").then(|| "abc\ndef".to_owned())
        })
        .expect_err("key with a newline is a configuration error");
        let (header_code, _header_out, header_message) = render(Err(CliError::from(header_err)));
        assert_eq!(header_code, 2);
        assert!(!header_message.starts_with("Holded API error"));

        let transport = TransportError::http_status(
            404,
            "GET",
            "/documents/invoice/x",
            "http://h/documents/invoice/x",
            Some("nope".to_owned()),
        );
        let (api_code, _api_out, api_err) =
            render(Err(CliError::from(HoldedError::from(transport))));
        assert_eq!(api_code, 1);
        assert_eq!(
            api_err,
            "Holded API error: Holded API error (404) calling GET /documents/invoice/x\n\
             status: 404\n\
             request: GET http://h/documents/invoice/x\n\
             response: nope\n"
        );
    }

    #[tokio::test]
    async fn invoke_runs_the_selected_operation() {
        let mock = MockHolded::json(200, &json!({ "id": "inv-9" })).await;
        let value = invoke(
            &settings_for(&mock),
            parse(&["holded-cli", "get", "inv-9"]),
            std::io::empty(),
        )
        .await
        .expect("get succeeds");
        assert_eq!(value, json!({ "id": "inv-9" }));
        assert_eq!(mock.last_request().path, "/documents/invoice/inv-9");
    }

    #[tokio::test]
    async fn invoke_reads_payload_from_stdin() {
        let mock = MockHolded::json(200, &json!({ "status": 1_i64 })).await;
        let _value = invoke(
            &settings_for(&mock),
            parse(&["holded-cli", "update", "inv-2", "--payload", "-"]),
            b"{\"notes\":\"paid by transfer\"}".as_slice(),
        )
        .await
        .expect("update succeeds");
        let request = mock.last_request();
        assert_eq!(request.method, "PUT");
        assert_eq!(request.json_body(), Some(json!({ "notes": "paid by transfer" })));
    }

    #[tokio::test]
    async fn invoke_reads_payload_file_off_the_runtime() {
        let mock = MockHolded::json(200, &json!({ "id": "new" })).await;
        let path = std::env::temp_dir().join(format!(
            "holded-cli-create-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"contactName":"ACME"}"#).expect("write payload file");
        let source = format!("@{}", path.display());
        let outcome = invoke(
            &settings_for(&mock),
            parse(&["holded-cli", "create", "--payload", &source]),
            std::io::empty(),
        )
        .await;
        let _removed = std::fs::remove_file(&path);
        assert_eq!(outcome.expect("create succeeds"), json!({ "id": "new" }));
        assert_eq!(
            mock.last_request().json_body(),
            Some(json!({ "contactName": "ACME" }))
        );
    }

    #[tokio::test]
    async fn bad_payload_never_reaches_the_api() {
        let mock = MockHolded::json(200, &json!({})).await;
        let err = invoke(
            &settings_for(&mock),
            parse(&["holded-cli", "create", "--payload", "[]"]),
            std::io::empty(),
        )
        .await
        .expect_err("array payload is rejected");
        assert_eq!(err.exit_code(), 2);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_invoice_exits_with_one() {
        let mock = MockHolded::start(404, "application/json", "{\"info\":\"Not found\"}").await;
        let outcome = invoke(
            &settings_for(&mock),
            parse(&["holded-cli", "delete", "gone"]),
            std::io::empty(),
        )
        .await
        .map_err(CliError::from);
        let (code, out, err) = render(outcome);
        assert_eq!(code, 1);
        assert!(out.is_empty());
        assert!(err.contains("status: 404"));
        assert!(err.contains(&format!("request: DELETE {}/documents/invoice/gone", mock.base_url())));
    }
}
