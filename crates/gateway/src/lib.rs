//! HTTP API gateway for Agora.
//!
//! Exposes the dispatch surface the web client consumes:
//!
//! - `GET  /health`     — liveness probe (rate-limit exempt)
//! - `GET  /v1/agents`  — list registered agents with schemas and policy
//! - `POST /v1/invoke`  — dispatch a request to an agent
//!
//! Dispatch outcomes travel in-band: a failed invocation is a `200` with a
//! failure envelope, never a bare 5xx — the error kind and retryable flag
//! are part of the API contract.
//!
//! Built on Axum. Security layers: restrictive CORS, 1 MB body limit,
//! in-memory sliding-window rate limiting, HTTP trace logging.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::{self, Next},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use agora_cache::ResponseCache;
use agora_core::descriptor::AgentDescriptor;
use agora_core::error::ErrorKind;
use agora_core::invocation::{AgentRequest, AgentResult};
use agora_dispatch::{BackoffPolicy, Dispatcher};

/// Shared application state for the gateway. Read-only after startup, so a
/// plain `Arc` suffices — no lock.
pub struct GatewayState {
    pub dispatcher: Arc<Dispatcher>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes and layers.
pub fn build_router(state: SharedState, rate_limit_per_minute: usize) -> Router {
    // CORS: only the local web client origin by default.
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::exact(
            "http://localhost:8080".parse().unwrap(),
        ))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    let rate_limiter = Arc::new(RateLimiter::new(
        rate_limit_per_minute,
        std::time::Duration::from_secs(60),
    ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/agents", get(agents_handler))
        .route("/v1/invoke", post(invoke_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Build all subsystems from config and serve until shutdown.
pub async fn start(config: agora_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(agora_adapters::build_registry(&config)?);
    let agent_count = registry.len();

    let cache = Arc::new(ResponseCache::new(config.cache.capacity));
    let dispatcher = Arc::new(
        Dispatcher::new(registry, cache).with_backoff(BackoffPolicy::from_config(&config.backoff)),
    );

    let state = Arc::new(GatewayState {
        dispatcher,
        started_at: chrono::Utc::now(),
    });
    let app = build_router(state, config.gateway.rate_limit_per_minute);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    info!(addr = %addr, agents = agent_count, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key.
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: std::time::Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<std::time::Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: std::time::Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        let now = std::time::Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Periodic cleanup: if map grows too large, evict stale entries
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Rate limiting middleware — keyed on the forwarded client address when a
/// proxy provides one, otherwise "anonymous". The /health endpoint is
/// exempt so monitoring can poll it freely.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let client_key = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if !limiter.check(&client_key) {
        warn!(client = %client_key.chars().take(40).collect::<String>(), "Rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: i64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

/// One agent as shown in the listing: contract plus dispatch policy.
#[derive(Serialize)]
struct AgentInfo {
    id: String,
    description: String,
    input_schema: serde_json::Value,
    output_schema: serde_json::Value,
    timeout_ms: u64,
    retry_count: u32,
    cache_ttl_secs: u64,
}

impl From<&AgentDescriptor> for AgentInfo {
    fn from(descriptor: &AgentDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            description: descriptor.description.clone(),
            input_schema: descriptor.input_schema.clone(),
            output_schema: descriptor.output_schema.clone(),
            timeout_ms: descriptor.timeout.as_millis() as u64,
            retry_count: descriptor.retry_count,
            cache_ttl_secs: descriptor.cache_ttl.as_secs(),
        }
    }
}

async fn agents_handler(State(state): State<SharedState>) -> Json<Vec<AgentInfo>> {
    let agents: Vec<AgentInfo> = state
        .dispatcher
        .registry()
        .descriptors()
        .into_iter()
        .map(AgentInfo::from)
        .collect();
    Json(agents)
}

#[derive(Deserialize)]
struct InvokeBody {
    agent_id: String,

    #[serde(default)]
    payload: serde_json::Value,

    #[serde(default)]
    request_id: Option<String>,
}

/// The uniform response envelope. `data` is present exactly when `status`
/// is "success"; `error` exactly when it is "failure".
#[derive(Serialize)]
struct InvokeEnvelope {
    status: &'static str,
    agent_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,

    #[serde(skip_serializing_if = "Option::is_none")]
    cache_hit: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
}

#[derive(Serialize)]
struct ErrorBody {
    kind: ErrorKind,
    message: String,
    retryable: bool,
}

impl InvokeEnvelope {
    fn from_result(agent_id: String, request_id: Option<String>, result: AgentResult) -> Self {
        match result {
            AgentResult::Success {
                output,
                latency_ms,
                cache_hit,
            } => Self {
                status: "success",
                agent_id,
                request_id,
                data: Some(output),
                error: None,
                cache_hit: Some(cache_hit),
                latency_ms: Some(latency_ms),
            },
            AgentResult::Failure {
                kind,
                message,
                retryable,
            } => Self {
                status: "failure",
                agent_id,
                request_id,
                data: None,
                error: Some(ErrorBody {
                    kind,
                    message,
                    retryable,
                }),
                cache_hit: None,
                latency_ms: None,
            },
        }
    }
}

async fn invoke_handler(
    State(state): State<SharedState>,
    Json(body): Json<InvokeBody>,
) -> Json<InvokeEnvelope> {
    let mut request = AgentRequest::new(body.agent_id.clone(), body.payload);
    if let Some(request_id) = body.request_id.clone() {
        request = request.with_request_id(request_id);
    }

    let result = state.dispatcher.handle(request).await;
    Json(InvokeEnvelope::from_result(
        body.agent_id,
        body.request_id,
        result,
    ))
}
