//! Request and result types for a single agent invocation.
//!
//! An `AgentRequest` is created per incoming call and consumed once; the
//! matching `AgentResult` is produced exactly once and never mutated.
//! There is no partial success: an invocation either fully succeeds with a
//! normalized output or fully fails with a classified error.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, InvokeError};

/// One incoming call naming an agent and carrying its raw payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    /// Which agent to invoke.
    pub agent_id: String,

    /// Raw input payload, validated against the agent's input contract
    /// before anything touches the network.
    pub payload: serde_json::Value,

    /// Client-supplied id for idempotency/tracing. Echoed back verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AgentRequest {
    pub fn new(agent_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            agent_id: agent_id.into(),
            payload,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// The uniform outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentResult {
    Success {
        /// Normalized output matching the agent's output contract.
        output: serde_json::Value,
        /// Wall-clock cost of producing the output. A cache hit reports the
        /// latency of the original upstream call.
        latency_ms: u64,
        /// Whether this result was served from the response cache.
        cache_hit: bool,
    },
    Failure {
        kind: ErrorKind,
        message: String,
        /// Whether an immediate retry could help. `false` means retrying
        /// now is futile; callers must trust this flag.
        retryable: bool,
    },
}

impl AgentResult {
    pub fn success(output: serde_json::Value, latency_ms: u64, cache_hit: bool) -> Self {
        AgentResult::Success {
            output,
            latency_ms,
            cache_hit,
        }
    }

    /// A failure carrying the error's own kind/message, with retryability
    /// decided by the caller — the dispatcher marks exhausted retries as
    /// `retryable = false` regardless of the underlying kind.
    pub fn failure(error: &InvokeError, retryable: bool) -> Self {
        AgentResult::Failure {
            kind: error.kind(),
            message: error.to_string(),
            retryable,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AgentResult::Success { .. })
    }

    /// The normalized output, if this is a success.
    pub fn output(&self) -> Option<&serde_json::Value> {
        match self {
            AgentResult::Success { output, .. } => Some(output),
            AgentResult::Failure { .. } => None,
        }
    }
}
