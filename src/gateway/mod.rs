//! Backend gateway boundary: two idempotent GET queries against the remote
//! valuation service (title correction; price search), plus the combined
//! single-call form. Every transport error, non-2xx status, or body-level
//! `error` field is normalized into `GatewayError` — nothing panics or
//! escapes past this boundary.

pub mod cache;
pub mod client;

use serde::{Deserialize, Serialize};

/// What the backend answered. Absent fields are None/empty, not an error;
/// in particular `price: None` means "answered, no market data found".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub corrected_title: Option<String>,
    pub price: Option<f64>,
    pub search_results: Vec<String>,
    pub query: Option<String>,
}

#[derive(Debug, Clone)]
pub enum GatewayError {
    /// The backend answered with a populated `error` field.
    Backend(String),
    /// HTTP-level failure (connect, DNS, timeout, body read).
    Transport(String),
    /// Non-2xx status. Treated identically to `Backend` by callers.
    Status(u16),
    /// Response body was not the expected JSON object.
    MalformedBody(String),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Backend(reason) => write!(f, "backend error: {reason}"),
            GatewayError::Transport(msg) => write!(f, "transport error: {msg}"),
            GatewayError::Status(code) => write!(f, "server returned status {code}"),
            GatewayError::MalformedBody(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

/// The two-phase query selector carried in the `step` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStep {
    Correct,
    Search,
    /// Legacy single-call form: correction and search in one request.
    Combined,
}

impl QueryStep {
    pub fn as_param(self) -> Option<&'static str> {
        match self {
            QueryStep::Correct => Some("correct"),
            QueryStep::Search => Some("search"),
            QueryStep::Combined => None,
        }
    }
}

/// Gateway seam: the controller only sees this trait, so tests run against
/// fakes and the cache wrapper layers transparently.
pub trait TitleGateway: Send + Sync {
    /// Ask the backend to normalize OCR noise into a plausible real title.
    fn correct_title(
        &self,
        raw_title: &str,
    ) -> impl std::future::Future<Output = Result<PriceQuote, GatewayError>> + Send;

    /// Resolve a market price (and search snippets) for a reviewed title.
    fn search_price(
        &self,
        title: &str,
    ) -> impl std::future::Future<Output = Result<PriceQuote, GatewayError>> + Send;

    /// Combined correction + search in one round trip (single-step variant).
    fn lookup(
        &self,
        raw_title: &str,
    ) -> impl std::future::Future<Output = Result<PriceQuote, GatewayError>> + Send;
}

// --- Wire shape ---

/// Raw response body. Fields vary across backend revisions; all optional.
#[derive(Debug, Deserialize)]
pub(crate) struct RawReply {
    #[serde(default)]
    price: Option<serde_json::Value>,
    #[serde(default, rename = "correctedTitle")]
    corrected_title: Option<String>,
    #[serde(default, rename = "searchResults")]
    search_results: Option<Vec<String>>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Legacy "no price found" sentinels seen across backend revisions. The
/// canonical form is JSON null / an absent field; these map to the same.
const LEGACY_NO_DATA: &[&str] = &["データなし", "DATA_NOT_FOUND"];

pub(crate) fn normalize_reply(raw: RawReply) -> Result<PriceQuote, GatewayError> {
    if let Some(reason) = raw.error {
        if !reason.is_empty() {
            return Err(GatewayError::Backend(reason));
        }
    }

    Ok(PriceQuote {
        corrected_title: raw.corrected_title,
        price: raw.price.and_then(normalize_price),
        search_results: raw.search_results.unwrap_or_default(),
        query: raw.query,
    })
}

/// Map the wire price field to an optional number. Numeric strings parse;
/// legacy sentinels and anything non-numeric mean "no data".
fn normalize_price(value: serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if LEGACY_NO_DATA.contains(&trimmed) {
                return None;
            }
            trimmed.parse::<f64>().ok()
        }
        _ => None,
    }
}
