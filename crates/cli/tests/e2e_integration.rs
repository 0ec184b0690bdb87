//! End-to-end integration tests for the Agora dispatch runtime.
//!
//! These tests exercise the full pipeline from an incoming request to the
//! uniform result envelope: registry lookup, validation, caching, bounded
//! retries, and the gateway surface.

use std::sync::Arc;
use std::time::Duration;

use agora_cache::ResponseCache;
use agora_core::adapter::Adapter;
use agora_core::descriptor::AgentDescriptor;
use agora_core::error::{ErrorKind, InvokeError};
use agora_core::invocation::{AgentRequest, AgentResult};
use agora_core::registry::AgentRegistry;
use agora_dispatch::{BackoffPolicy, Dispatcher};

// ── Mock Adapter ─────────────────────────────────────────────────────────

/// A mock adapter that returns scripted outcomes in sequence, then falls
/// back to a fixed success output once the script is drained.
struct ScriptedAdapter {
    id: &'static str,
    outcomes: std::sync::Mutex<Vec<Result<serde_json::Value, InvokeError>>>,
    fallback: serde_json::Value,
    call_count: std::sync::Mutex<usize>,
}

impl ScriptedAdapter {
    fn new(id: &'static str, mut outcomes: Vec<Result<serde_json::Value, InvokeError>>) -> Self {
        // Stored back-to-front so each invoke can pop the next outcome.
        outcomes.reverse();
        Self {
            id,
            outcomes: std::sync::Mutex::new(outcomes),
            fallback: serde_json::json!({"translated": "bonjour", "detected_source": "en"}),
            call_count: std::sync::Mutex::new(0),
        }
    }

    fn always(id: &'static str, output: serde_json::Value) -> Self {
        Self {
            id,
            outcomes: std::sync::Mutex::new(Vec::new()),
            fallback: output,
            call_count: std::sync::Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Adapter for ScriptedAdapter {
    fn agent_id(&self) -> &str {
        self.id
    }

    fn description(&self) -> &str {
        "scripted e2e adapter"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" }, "target": { "type": "string" } },
            "required": ["text", "target"]
        })
    }

    fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    fn validate(&self, payload: &serde_json::Value) -> Result<(), InvokeError> {
        match payload.get("text").and_then(|v| v.as_str()) {
            Some(text) if !text.trim().is_empty() => Ok(()),
            _ => Err(InvokeError::InvalidInput("'text' must not be empty".into())),
        }
    }

    async fn invoke(
        &self,
        _payload: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError> {
        *self.call_count.lock().unwrap() += 1;
        self.outcomes
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

fn descriptor(id: &str, retry_count: u32) -> AgentDescriptor {
    AgentDescriptor {
        id: id.into(),
        description: format!("{id} e2e agent"),
        input_schema: serde_json::json!({"type": "object"}),
        output_schema: serde_json::json!({"type": "object"}),
        timeout: Duration::from_secs(5),
        retry_count,
        cache_ttl: Duration::from_secs(60),
    }
}

fn test_backoff() -> BackoffPolicy {
    BackoffPolicy {
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

fn build_dispatcher(
    adapters: Vec<(AgentDescriptor, Arc<dyn Adapter>)>,
) -> Arc<Dispatcher> {
    let mut registry = AgentRegistry::new();
    for (desc, adapter) in adapters {
        registry.register(desc, adapter).unwrap();
    }
    let cache = Arc::new(ResponseCache::new(64));
    Arc::new(Dispatcher::new(Arc::new(registry), cache).with_backoff(test_backoff()))
}

// ── E2E: Full Dispatch Pipeline ──────────────────────────────────────────

#[tokio::test]
async fn e2e_translator_scenario_with_cache_hit() {
    // Scenario from the marketplace contract: translate "hello" to French,
    // then repeat the identical request and get the cached result.
    let adapter = Arc::new(ScriptedAdapter::always(
        "translator",
        serde_json::json!({"translated": "bonjour", "detected_source": "en"}),
    ));
    let dispatcher = build_dispatcher(vec![(descriptor("translator", 2), adapter.clone())]);

    let payload = serde_json::json!({"text": "hello", "target": "fr"});

    let first = dispatcher
        .handle(AgentRequest::new("translator", payload.clone()))
        .await;
    let first_output = match &first {
        AgentResult::Success {
            output, cache_hit, ..
        } => {
            assert!(!cache_hit);
            assert_eq!(output["translated"], "bonjour");
            assert_eq!(output["detected_source"], "en");
            output.clone()
        }
        AgentResult::Failure { .. } => panic!("expected success"),
    };

    let second = dispatcher
        .handle(AgentRequest::new("translator", payload))
        .await;
    match &second {
        AgentResult::Success {
            output, cache_hit, ..
        } => {
            assert!(cache_hit);
            assert_eq!(
                serde_json::to_vec(output).unwrap(),
                serde_json::to_vec(&first_output).unwrap()
            );
        }
        AgentResult::Failure { .. } => panic!("expected success"),
    }

    assert_eq!(adapter.calls(), 1);
}

#[tokio::test]
async fn e2e_unknown_agent_zero_upstream_calls() {
    let adapter = Arc::new(ScriptedAdapter::always(
        "translator",
        serde_json::json!({"translated": "bonjour"}),
    ));
    let dispatcher = build_dispatcher(vec![(descriptor("translator", 2), adapter.clone())]);

    let result = dispatcher
        .handle(AgentRequest::new("unknown", serde_json::json!({})))
        .await;

    match result {
        AgentResult::Failure { kind, .. } => assert_eq!(kind, ErrorKind::UnknownAgent),
        AgentResult::Success { .. } => panic!("expected failure"),
    }
    assert_eq!(adapter.calls(), 0);
}

#[tokio::test]
async fn e2e_invalid_payload_fails_fast() {
    let adapter = Arc::new(ScriptedAdapter::always(
        "translator",
        serde_json::json!({"translated": "bonjour"}),
    ));
    let dispatcher = build_dispatcher(vec![(descriptor("translator", 2), adapter.clone())]);

    let result = dispatcher
        .handle(AgentRequest::new(
            "translator",
            serde_json::json!({"text": "", "target": "fr"}),
        ))
        .await;

    match result {
        AgentResult::Failure { kind, .. } => assert_eq!(kind, ErrorKind::InvalidInput),
        AgentResult::Success { .. } => panic!("expected failure"),
    }
    assert_eq!(adapter.calls(), 0);
}

#[tokio::test]
async fn e2e_retry_exhaustion_reports_not_retryable() {
    let outcomes = (0..10)
        .map(|_| Err(InvokeError::UpstreamRateLimited { retry_after: None }))
        .collect();
    let adapter = Arc::new(ScriptedAdapter::new("insight", outcomes));
    let dispatcher = build_dispatcher(vec![(descriptor("insight", 2), adapter.clone())]);

    let result = dispatcher
        .handle(AgentRequest::new(
            "insight",
            serde_json::json!({"text": "BTC-USD", "target": "none"}),
        ))
        .await;

    match result {
        AgentResult::Failure {
            kind, retryable, ..
        } => {
            assert_eq!(kind, ErrorKind::UpstreamRateLimited);
            assert!(!retryable);
        }
        AgentResult::Success { .. } => panic!("expected failure"),
    }
    assert_eq!(adapter.calls(), 3); // retry_count + 1
}

#[tokio::test]
async fn e2e_transient_failure_recovers_and_caches() {
    let adapter = Arc::new(ScriptedAdapter::new(
        "translator",
        vec![
            Err(InvokeError::UpstreamTimeout { timeout_ms: 50 }),
            Ok(serde_json::json!({"translated": "hola", "detected_source": "en"})),
        ],
    ));
    let dispatcher = build_dispatcher(vec![(descriptor("translator", 2), adapter.clone())]);

    let payload = serde_json::json!({"text": "hello", "target": "es"});
    let result = dispatcher
        .handle(AgentRequest::new("translator", payload.clone()))
        .await;
    assert!(result.is_success());
    assert_eq!(adapter.calls(), 2);

    // The recovered success is cached; the earlier failure is not.
    let repeat = dispatcher
        .handle(AgentRequest::new("translator", payload))
        .await;
    match repeat {
        AgentResult::Success { cache_hit, .. } => assert!(cache_hit),
        AgentResult::Failure { .. } => panic!("expected success"),
    }
    assert_eq!(adapter.calls(), 2);
}

// ── E2E: Registry From Configuration ─────────────────────────────────────

#[tokio::test]
async fn e2e_registry_built_from_default_config() {
    let config = agora_config::AppConfig::default();
    let registry = agora_adapters::build_registry(&config).expect("default roster builds");

    assert_eq!(registry.len(), 3);
    for id in ["insight", "ideation", "translator"] {
        let agent = registry.lookup(id).expect("agent registered");
        assert_eq!(agent.descriptor.id, id);
        assert!(!agent.descriptor.description.is_empty());
        assert!(agent.descriptor.input_schema["properties"].is_object());
    }
}

#[tokio::test]
async fn e2e_local_rejections_make_no_upstream_calls() {
    // The real adapters refuse bad payloads before any network I/O, so
    // dispatching against unreachable upstreams must still fail cleanly.
    let config = agora_config::AppConfig::default();
    let registry = Arc::new(agora_adapters::build_registry(&config).unwrap());
    let cache = Arc::new(ResponseCache::new(16));
    let dispatcher = Dispatcher::new(registry, cache).with_backoff(test_backoff());

    // Empty ideation prompt: validation error.
    let result = dispatcher
        .handle(AgentRequest::new(
            "ideation",
            serde_json::json!({"prompt": "  "}),
        ))
        .await;
    match result {
        AgentResult::Failure { kind, .. } => assert_eq!(kind, ErrorKind::InvalidInput),
        AgentResult::Success { .. } => panic!("expected failure"),
    }

    // Unsupported translation target: domain rejection from the allow-list.
    let result = dispatcher
        .handle(AgentRequest::new(
            "translator",
            serde_json::json!({"text": "hello", "target": "tlh"}),
        ))
        .await;
    match result {
        AgentResult::Failure {
            kind, retryable, ..
        } => {
            assert_eq!(kind, ErrorKind::UpstreamRejected);
            assert!(!retryable);
        }
        AgentResult::Success { .. } => panic!("expected failure"),
    }
}

// ── E2E: Gateway Surface ─────────────────────────────────────────────────

#[tokio::test]
async fn e2e_gateway_invoke_roundtrip() {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    let adapter = Arc::new(ScriptedAdapter::always(
        "translator",
        serde_json::json!({"translated": "bonjour", "detected_source": "en"}),
    ));
    let dispatcher = build_dispatcher(vec![(descriptor("translator", 2), adapter)]);
    let state = Arc::new(agora_gateway::GatewayState {
        dispatcher,
        started_at: chrono::Utc::now(),
    });
    let app = agora_gateway::build_router(state, 60);

    let req = Request::builder()
        .method("POST")
        .uri("/v1/invoke")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "agent_id": "translator",
                "payload": {"text": "hello", "target": "fr"},
                "request_id": "e2e-1"
            })
            .to_string(),
        ))
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), 200);

    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["agent_id"], "translator");
    assert_eq!(json["request_id"], "e2e-1");
    assert_eq!(json["data"]["translated"], "bonjour");
    assert_eq!(json["cache_hit"], false);
}

// ── E2E: Configuration System ────────────────────────────────────────────

#[tokio::test]
async fn e2e_config_defaults_and_roundtrip() {
    let config = agora_config::AppConfig::default();

    assert!(config.gateway.port > 0);
    assert!(!config.gateway.host.is_empty());
    assert!(config.cache.capacity > 0);
    assert_eq!(config.agents.len(), 3);

    let toml_str = toml::to_string_pretty(&config).expect("Config should serialize");
    let reparsed: agora_config::AppConfig =
        toml::from_str(&toml_str).expect("Config should parse back");

    assert_eq!(reparsed.gateway.port, config.gateway.port);
    assert_eq!(reparsed.agents.len(), config.agents.len());
}
