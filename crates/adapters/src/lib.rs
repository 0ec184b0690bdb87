//! Capability adapter implementations for the Agora marketplace agents.
//!
//! All adapters implement the `agora_core::Adapter` trait. Each one wraps a
//! different upstream service with its own wire shape and failure
//! vocabulary; everything they share — timeouts, retries, caching — lives
//! in the dispatcher, not here.

pub mod ideation;
pub mod insight;
pub mod translation;

pub use ideation::IdeationAdapter;
pub use insight::InsightAdapter;
pub use translation::TranslationAdapter;

use std::sync::Arc;

use agora_config::AppConfig;
use agora_core::adapter::Adapter;
use agora_core::descriptor::AgentDescriptor;
use agora_core::error::{Error, InvokeError};
use agora_core::registry::AgentRegistry;

/// Build the frozen agent registry from configuration: one descriptor and
/// adapter per enabled agent entry. Fails on ids with no matching adapter
/// and on duplicates — a misconfigured roster should stop startup, not
/// surface later as per-request errors.
pub fn build_registry(config: &AppConfig) -> agora_core::Result<AgentRegistry> {
    let mut registry = AgentRegistry::new();

    for agent_cfg in config.agents.iter().filter(|a| a.enabled) {
        let upstream = config.upstream(&agent_cfg.id);
        let adapter: Arc<dyn Adapter> = match agent_cfg.id.as_str() {
            "insight" => Arc::new(InsightAdapter::from_config(&upstream)),
            "ideation" => Arc::new(IdeationAdapter::from_config(&upstream)),
            "translator" => Arc::new(TranslationAdapter::from_config(&upstream)),
            other => {
                return Err(Error::Config {
                    message: format!("no adapter available for agent id '{other}'"),
                });
            }
        };

        let descriptor = AgentDescriptor {
            id: agent_cfg.id.clone(),
            description: adapter.description().to_string(),
            input_schema: adapter.input_schema(),
            output_schema: adapter.output_schema(),
            timeout: agent_cfg.timeout(),
            retry_count: agent_cfg.retry_count,
            cache_ttl: agent_cfg.cache_ttl(),
        };
        registry.register(descriptor, adapter)?;
    }

    Ok(registry)
}

/// Classify a reqwest transport error: client-side timeouts are retryable
/// infrastructure failures, anything else is an unexpected fault.
pub(crate) fn classify_transport_error(
    err: reqwest::Error,
    client_timeout: std::time::Duration,
) -> InvokeError {
    if err.is_timeout() {
        InvokeError::UpstreamTimeout {
            timeout_ms: client_timeout.as_millis() as u64,
        }
    } else {
        InvokeError::Internal(format!("transport error: {err}"))
    }
}

/// Parse a `Retry-After` header given in seconds, when the upstream sends
/// one. Date-form values are ignored.
pub(crate) fn retry_after_hint(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
