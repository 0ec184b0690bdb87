//! Market insight adapter.
//!
//! Wraps an external market-data/analysis service: given a ticker symbol
//! and an optional lookback window, returns a narrative summary with an
//! optional numeric signal. Rate limits and unknown symbols are the
//! upstream's domain vocabulary and classify as domain errors, never as
//! infrastructure faults.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use agora_core::adapter::Adapter;
use agora_core::error::InvokeError;

use crate::{classify_transport_error, retry_after_hint};

const DEFAULT_BASE_URL: &str = "https://api.marketpulse.dev";
const DEFAULT_LOOKBACK_DAYS: u32 = 30;
const MAX_LOOKBACK_DAYS: u32 = 365;

/// Safety net on the HTTP client; the dispatcher enforces the real
/// per-attempt budget.
const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// Annualized volatility above this is worth flagging to the caller.
const VOLATILITY_ALERT_THRESHOLD: f64 = 0.05;

/// Input contract for the insight agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsightInput {
    /// Ticker symbol, e.g. "BTC-USD" or "AAPL".
    pub symbol: String,

    /// Analysis window in days; defaults to 30.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookback_days: Option<u32>,
}

/// Normalized output of the insight agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightReport {
    pub symbol: String,
    pub summary: String,

    /// Composite signal in [-1.0, 1.0]; negative is bearish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<f64>,

    /// Set when the window shows unusual volatility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamAnalysis {
    summary: String,
    #[serde(default)]
    signal: Option<f64>,
    #[serde(default)]
    volatility: Option<f64>,
}

/// Adapter for the market insight agent.
pub struct InsightAdapter {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl InsightAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            client,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn from_config(upstream: &agora_config::UpstreamConfig) -> Self {
        let mut adapter = Self::new(upstream.api_key.clone());
        if let Some(url) = &upstream.api_url {
            adapter = adapter.with_base_url(url);
        }
        adapter
    }

    fn parse_input(payload: &serde_json::Value) -> Result<InsightInput, InvokeError> {
        let input: InsightInput = serde_json::from_value(payload.clone())
            .map_err(|e| InvokeError::InvalidInput(e.to_string()))?;

        if input.symbol.trim().is_empty() {
            return Err(InvokeError::InvalidInput("'symbol' must not be empty".into()));
        }
        if let Some(days) = input.lookback_days {
            if days == 0 || days > MAX_LOOKBACK_DAYS {
                return Err(InvokeError::InvalidInput(format!(
                    "'lookback_days' must be in 1..={MAX_LOOKBACK_DAYS}"
                )));
            }
        }
        Ok(input)
    }

    /// Map an upstream HTTP status to the error taxonomy. The analysis
    /// service answers 404 for symbols it does not track — a domain
    /// rejection, not an outage.
    fn classify_status(status: u16, body: &str, retry_after: Option<u64>) -> InvokeError {
        match status {
            429 => InvokeError::UpstreamRateLimited {
                retry_after: retry_after.map(std::time::Duration::from_secs),
            },
            404 | 422 => InvokeError::UpstreamRejected(format!("unknown symbol: {body}")),
            401 | 403 => InvokeError::Internal("market data authentication failed".into()),
            _ => InvokeError::Internal(format!("market data service returned {status}: {body}")),
        }
    }

    fn to_report(symbol: &str, analysis: UpstreamAnalysis) -> InsightReport {
        let alert = analysis
            .volatility
            .filter(|v| *v > VOLATILITY_ALERT_THRESHOLD)
            .map(|v| format!("unusual volatility detected ({v:.3} annualized)"));

        InsightReport {
            symbol: symbol.to_string(),
            summary: analysis.summary,
            signal: analysis.signal,
            alert,
        }
    }
}

#[async_trait]
impl Adapter for InsightAdapter {
    fn agent_id(&self) -> &str {
        "insight"
    }

    fn description(&self) -> &str {
        "Market insight lookup: technical and sentiment summary for a ticker symbol"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Ticker symbol to analyze, e.g. BTC-USD"
                },
                "lookback_days": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_LOOKBACK_DAYS,
                    "description": "Analysis window in days (default: 30)"
                }
            },
            "required": ["symbol"],
            "additionalProperties": false
        })
    }

    fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "symbol": { "type": "string" },
                "summary": { "type": "string" },
                "signal": { "type": "number" },
                "alert": { "type": "string" }
            },
            "required": ["symbol", "summary"]
        })
    }

    fn validate(&self, payload: &serde_json::Value) -> Result<(), InvokeError> {
        Self::parse_input(payload).map(|_| ())
    }

    async fn invoke(
        &self,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError> {
        let input = Self::parse_input(&payload)?;
        let symbol = input.symbol.trim().to_uppercase();
        let lookback = input.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);

        let url = format!("{}/v1/analysis", self.base_url);
        let body = serde_json::json!({
            "symbol": symbol,
            "lookback_days": lookback,
        });

        debug!(%symbol, lookback, "requesting market analysis");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(e, HTTP_TIMEOUT))?;

        let status = response.status().as_u16();
        if status != 200 {
            let retry_after = retry_after_hint(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body, retry_after));
        }

        let analysis: UpstreamAnalysis = response.json().await.map_err(|e| {
            InvokeError::Internal(format!("failed to parse analysis response: {e}"))
        })?;

        let report = Self::to_report(&symbol, analysis);
        serde_json::to_value(&report)
            .map_err(|e| InvokeError::Internal(format!("failed to serialize report: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_input_parses() {
        let input =
            InsightAdapter::parse_input(&serde_json::json!({"symbol": "BTC-USD"})).unwrap();
        assert_eq!(input.symbol, "BTC-USD");
        assert!(input.lookback_days.is_none());
    }

    #[test]
    fn empty_symbol_rejected() {
        let err =
            InsightAdapter::parse_input(&serde_json::json!({"symbol": "  "})).unwrap_err();
        assert!(matches!(err, InvokeError::InvalidInput(_)));
    }

    #[test]
    fn lookback_bounds_enforced() {
        let err = InsightAdapter::parse_input(
            &serde_json::json!({"symbol": "AAPL", "lookback_days": 0}),
        )
        .unwrap_err();
        assert!(matches!(err, InvokeError::InvalidInput(_)));

        let err = InsightAdapter::parse_input(
            &serde_json::json!({"symbol": "AAPL", "lookback_days": 9999}),
        )
        .unwrap_err();
        assert!(matches!(err, InvokeError::InvalidInput(_)));
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = InsightAdapter::parse_input(
            &serde_json::json!({"symbol": "AAPL", "window": 5}),
        )
        .unwrap_err();
        assert!(matches!(err, InvokeError::InvalidInput(_)));
    }

    #[test]
    fn rate_limit_classification_carries_hint() {
        let err = InsightAdapter::classify_status(429, "slow down", Some(12));
        assert!(err.retryable());
        assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(12)));
    }

    #[test]
    fn unknown_symbol_is_domain_rejection() {
        let err = InsightAdapter::classify_status(404, "no such symbol: ZZZZ", None);
        assert!(matches!(err, InvokeError::UpstreamRejected(_)));
        assert!(!err.retryable());
    }

    #[test]
    fn auth_failure_is_internal() {
        let err = InsightAdapter::classify_status(401, "bad key", None);
        assert!(matches!(err, InvokeError::Internal(_)));
    }

    #[test]
    fn volatility_alert_derivation() {
        let calm = InsightAdapter::to_report(
            "AAPL",
            UpstreamAnalysis {
                summary: "steady".into(),
                signal: Some(0.1),
                volatility: Some(0.02),
            },
        );
        assert!(calm.alert.is_none());

        let wild = InsightAdapter::to_report(
            "BTC-USD",
            UpstreamAnalysis {
                summary: "choppy".into(),
                signal: Some(-0.4),
                volatility: Some(0.09),
            },
        );
        assert!(wild.alert.as_deref().unwrap().contains("volatility"));
    }

    #[test]
    fn report_serialization_omits_absent_fields() {
        let report = InsightReport {
            symbol: "AAPL".into(),
            summary: "steady".into(),
            signal: None,
            alert: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("signal").is_none());
        assert!(json.get("alert").is_none());
    }

    #[test]
    fn upstream_response_parsing() {
        let analysis: UpstreamAnalysis = serde_json::from_str(
            r#"{"summary": "Momentum is positive", "signal": 0.62, "volatility": 0.031}"#,
        )
        .unwrap();
        assert_eq!(analysis.signal, Some(0.62));

        // Minimal response with only a summary.
        let minimal: UpstreamAnalysis =
            serde_json::from_str(r#"{"summary": "quiet week"}"#).unwrap();
        assert!(minimal.signal.is_none());
        assert!(minimal.volatility.is_none());
    }
}
