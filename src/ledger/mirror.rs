//! Client for the remote ledger mirror (a spreadsheet-backed web app).
//!
//! The mirror is best effort: every call may fail, and callers decide what
//! to fall back to. An unconfigured mirror fails every call with
//! [`MirrorError::NotConfigured`] without touching the network.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::MirrorConfig;
use crate::ledger::catalog::{self, CategoryId};
use crate::ledger::store::{ExpenseRecord, IncomeRecord, iso_timestamp};
use crate::ledger::window::TimeWindow;

const KEY_HEADER: &str = "X-AppsScript-Key";

/// Largest magnitude accepted for a mirror total, in whole dollars.
const MAX_TOTAL_USD: i64 = 1_000_000_000_000_000;

#[derive(Debug)]
pub enum MirrorError {
    /// No mirror URL configured.
    NotConfigured,
    Timeout,
    Transport(String),
    /// Non-2xx response.
    Status(u16, String),
    /// The mirror answered `ok: false`.
    Rejected,
    Malformed(String),
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "mirror not configured"),
            Self::Timeout => write!(f, "mirror request timed out"),
            Self::Transport(e) => write!(f, "mirror transport error: {e}"),
            Self::Status(code, body) => write!(f, "mirror returned {code}: {body}"),
            Self::Rejected => write!(f, "mirror rejected the request"),
            Self::Malformed(e) => write!(f, "malformed mirror payload: {e}"),
        }
    }
}

impl std::error::Error for MirrorError {}

/// Record pushed to the mirror after a local write.
#[derive(Debug, Clone, Copy)]
pub enum MirrorEntry<'a> {
    Expense(&'a ExpenseRecord),
    Income(&'a IncomeRecord),
}

/// Expense totals reported by the mirror, keyed by category.
pub type MirrorTotals = BTreeMap<CategoryId, Decimal>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorBalance {
    pub expenses_total: Decimal,
    pub incomes_total: Decimal,
}

#[async_trait]
pub trait LedgerMirror: Send + Sync {
    async fn append(&self, entry: MirrorEntry<'_>) -> Result<(), MirrorError>;

    async fn summary(
        &self,
        user: &str,
        window: &TimeWindow,
        category: Option<CategoryId>,
    ) -> Result<MirrorTotals, MirrorError>;

    async fn balance(&self, user: &str, window: &TimeWindow) -> Result<MirrorBalance, MirrorError>;
}

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Request<'a> {
    Append {
        kind: &'static str,
        user: &'a str,
        amount_usd: Decimal,
        #[serde(skip_serializing_if = "Option::is_none")]
        category_id: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        category_name: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<&'a str>,
        timestamp_iso: String,
    },
    Summary {
        user: &'a str,
        start_epoch: i64,
        end_epoch: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        category_id: Option<u8>,
    },
    Balance {
        user: &'a str,
        start_epoch: i64,
        end_epoch: i64,
    },
}

impl<'a> Request<'a> {
    fn append(entry: MirrorEntry<'a>) -> Self {
        match entry {
            MirrorEntry::Expense(r) => Self::Append {
                kind: "expense",
                user: &r.user,
                amount_usd: r.amount,
                category_id: Some(r.category.get()),
                category_name: Some(&r.category_name),
                source: None,
                timestamp_iso: iso_timestamp(&r.timestamp),
            },
            MirrorEntry::Income(r) => Self::Append {
                kind: "income",
                user: &r.user,
                amount_usd: r.amount,
                category_id: None,
                category_name: None,
                source: Some(&r.source),
                timestamp_iso: iso_timestamp(&r.timestamp),
            },
        }
    }
}

struct Endpoint {
    url: String,
    key: Option<String>,
}

/// HTTP implementation of [`LedgerMirror`].
pub struct RemoteMirror {
    endpoint: Option<Endpoint>,
    http: reqwest::Client,
}

impl RemoteMirror {
    pub fn new(config: Option<&MirrorConfig>) -> Self {
        let Some(config) = config else {
            return Self::disabled();
        };
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint: Some(Endpoint {
                url: config.url.clone(),
                key: config.key.clone(),
            }),
            http,
        }
    }

    pub fn disabled() -> Self {
        Self {
            endpoint: None,
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, request: &Request<'_>) -> Result<String, MirrorError> {
        let endpoint = self.endpoint.as_ref().ok_or(MirrorError::NotConfigured)?;

        let mut builder = self.http.post(&endpoint.url).json(request);
        if let Some(ref key) = endpoint.key {
            builder = builder.header(KEY_HEADER, key);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(MirrorError::Status(status.as_u16(), body));
        }
        Ok(body)
    }
}

fn transport_error(e: reqwest::Error) -> MirrorError {
    if e.is_timeout() {
        MirrorError::Timeout
    } else {
        MirrorError::Transport(e.to_string())
    }
}

#[async_trait]
impl LedgerMirror for RemoteMirror {
    async fn append(&self, entry: MirrorEntry<'_>) -> Result<(), MirrorError> {
        let body = self.post(&Request::append(entry)).await?;
        // Older deployments answer appends with an empty or plain-text body.
        match serde_json::from_str::<Value>(&body) {
            Ok(value) if value.get("ok") == Some(&Value::Bool(false)) => Err(MirrorError::Rejected),
            _ => Ok(()),
        }
    }

    async fn summary(
        &self,
        user: &str,
        window: &TimeWindow,
        category: Option<CategoryId>,
    ) -> Result<MirrorTotals, MirrorError> {
        let request = Request::Summary {
            user,
            start_epoch: window.start,
            end_epoch: window.end,
            category_id: category.map(CategoryId::get),
        };
        parse_summary(&self.post(&request).await?)
    }

    async fn balance(&self, user: &str, window: &TimeWindow) -> Result<MirrorBalance, MirrorError> {
        let request = Request::Balance {
            user,
            start_epoch: window.start,
            end_epoch: window.end,
        };
        parse_balance(&self.post(&request).await?)
    }
}

fn parse_ok(body: &str) -> Result<Value, MirrorError> {
    let value: Value = serde_json::from_str(body).map_err(|e| MirrorError::Malformed(e.to_string()))?;
    match value.get("ok") {
        Some(Value::Bool(true)) => Ok(value),
        Some(Value::Bool(false)) => Err(MirrorError::Rejected),
        _ => Err(MirrorError::Malformed("missing boolean `ok`".into())),
    }
}

/// Accept amounts as JSON numbers or decimal strings.
fn parse_amount(value: &Value) -> Result<Decimal, MirrorError> {
    let parsed = match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).or_else(|_| Decimal::from_scientific(&n.to_string())),
        Value::String(s) => Decimal::from_str(s.trim()),
        other => return Err(MirrorError::Malformed(format!("amount is not numeric: {other}"))),
    };
    let amount = parsed.map_err(|e| MirrorError::Malformed(format!("bad amount {value}: {e}")))?;
    if amount.abs() > Decimal::from(MAX_TOTAL_USD) {
        return Err(MirrorError::Malformed(format!("amount out of range: {value}")));
    }
    Ok(amount)
}

pub(crate) fn parse_summary(body: &str) -> Result<MirrorTotals, MirrorError> {
    let value = parse_ok(body)?;
    let totals = value
        .get("totals")
        .and_then(Value::as_object)
        .ok_or_else(|| MirrorError::Malformed("missing `totals` object".into()))?;

    let mut parsed = MirrorTotals::new();
    for (key, amount) in totals {
        match catalog::lookup(key) {
            Some(id) => {
                parsed.insert(id, parse_amount(amount)?);
            }
            None => debug!("Ignoring mirror total for unknown category {key:?}"),
        }
    }
    Ok(parsed)
}

pub(crate) fn parse_balance(body: &str) -> Result<MirrorBalance, MirrorError> {
    let value = parse_ok(body)?;
    let field = |name: &str| {
        value
            .get(name)
            .ok_or_else(|| MirrorError::Malformed(format!("missing `{name}`")))
            .and_then(parse_amount)
    };
    Ok(MirrorBalance {
        expenses_total: field("expenses_total")?,
        incomes_total: field("incomes_total")?,
    })
}
