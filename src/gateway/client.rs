//! HTTP gateway client. One pooled reqwest client, one attempt per call —
//! both endpoints are idempotent GETs, so retry policy lives with the
//! caller, not here.

use std::time::Duration;

use tracing::{debug, warn};

use super::{normalize_reply, GatewayError, PriceQuote, QueryStep, RawReply, TitleGateway};

pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a client for the given backend endpoint. Reads
    /// `BOOKWORTH_GATEWAY_URL` when no explicit URL is supplied.
    pub fn new(base_url: Option<String>) -> Result<Self, GatewayError> {
        let base_url = match base_url {
            Some(url) => url,
            None => std::env::var("BOOKWORTH_GATEWAY_URL").map_err(|_| {
                GatewayError::Transport("BOOKWORTH_GATEWAY_URL environment variable not set".into())
            })?,
        };

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self { http, base_url })
    }

    async fn query(&self, title: &str, step: QueryStep) -> Result<PriceQuote, GatewayError> {
        let mut params: Vec<(&str, &str)> = vec![("title", title)];
        if let Some(step_param) = step.as_param() {
            params.push(("step", step_param));
        }

        debug!(step = ?step, title_chars = title.chars().count(), "gateway_request");

        let response = self
            .http
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "gateway_non_success_status");
            return Err(GatewayError::Status(status.as_u16()));
        }

        let raw: RawReply = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedBody(e.to_string()))?;

        let quote = normalize_reply(raw)?;
        debug!(
            has_price = quote.price.is_some(),
            has_corrected = quote.corrected_title.is_some(),
            results = quote.search_results.len(),
            "gateway_response"
        );
        Ok(quote)
    }
}

impl TitleGateway for HttpGateway {
    async fn correct_title(&self, raw_title: &str) -> Result<PriceQuote, GatewayError> {
        self.query(raw_title, QueryStep::Correct).await
    }

    async fn search_price(&self, title: &str) -> Result<PriceQuote, GatewayError> {
        self.query(title, QueryStep::Search).await
    }

    async fn lookup(&self, raw_title: &str) -> Result<PriceQuote, GatewayError> {
        self.query(raw_title, QueryStep::Combined).await
    }
}
