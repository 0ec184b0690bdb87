//! `agora invoke` — Dispatch one request from the terminal.
//!
//! Prints the same envelope shape the gateway returns, so terminal output
//! is copy-paste comparable with API responses.

use std::sync::Arc;

use agora_cache::ResponseCache;
use agora_config::AppConfig;
use agora_core::invocation::{AgentRequest, AgentResult};
use agora_dispatch::{BackoffPolicy, Dispatcher};

pub async fn run(
    agent: String,
    payload: String,
    request_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let payload: serde_json::Value = serde_json::from_str(&payload)
        .map_err(|e| format!("--payload is not valid JSON: {e}"))?;

    let registry = Arc::new(agora_adapters::build_registry(&config)?);
    let cache = Arc::new(ResponseCache::new(config.cache.capacity));
    let dispatcher = Dispatcher::new(registry, cache)
        .with_backoff(BackoffPolicy::from_config(&config.backoff));

    let request_id = request_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let request = AgentRequest::new(&agent, payload).with_request_id(&request_id);

    let result = dispatcher.handle(request).await;

    let envelope = match &result {
        AgentResult::Success {
            output,
            latency_ms,
            cache_hit,
        } => serde_json::json!({
            "status": "success",
            "agent_id": agent,
            "request_id": request_id,
            "data": output,
            "cache_hit": cache_hit,
            "latency_ms": latency_ms,
        }),
        AgentResult::Failure {
            kind,
            message,
            retryable,
        } => serde_json::json!({
            "status": "failure",
            "agent_id": agent,
            "request_id": request_id,
            "error": { "kind": kind, "message": message, "retryable": retryable },
        }),
    };

    println!("{}", serde_json::to_string_pretty(&envelope)?);

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
