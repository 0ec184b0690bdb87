//! Error types for the Agora domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! `InvokeError` is the per-request taxonomy every adapter classifies into;
//! `Error` is the top-level type for everything else (startup, config, IO).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// The top-level error type for all Agora operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Per-request dispatch errors ---
    #[error("Invoke error: {0}")]
    Invoke(#[from] InvokeError),

    // --- Registry errors ---
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable classification of a per-request failure, exposed to callers
/// verbatim. Callers must never guess at retryability from the kind; the
/// `retryable` flag on the final result is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No agent registered under the requested id.
    UnknownAgent,
    /// The payload does not match the agent's input contract.
    InvalidInput,
    /// The upstream call exceeded the descriptor's timeout budget.
    UpstreamTimeout,
    /// The upstream throttled us.
    UpstreamRateLimited,
    /// The upstream (or a local stand-in for it) rejected the request on
    /// domain grounds — unknown symbol, unsupported language.
    UpstreamRejected,
    /// Unexpected adapter fault. Logged for operator investigation.
    InternalError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::UnknownAgent => "UnknownAgent",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::UpstreamTimeout => "UpstreamTimeout",
            ErrorKind::UpstreamRateLimited => "UpstreamRateLimited",
            ErrorKind::UpstreamRejected => "UpstreamRejected",
            ErrorKind::InternalError => "InternalError",
        };
        f.write_str(s)
    }
}

/// A classified per-request failure.
///
/// Adapters translate their upstream's failure vocabulary into one of these
/// variants before returning; the dispatcher passes kinds through its retry
/// logic unchanged.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("upstream call timed out after {timeout_ms}ms")]
    UpstreamTimeout { timeout_ms: u64 },

    #[error("rate limited by upstream")]
    UpstreamRateLimited { retry_after: Option<Duration> },

    #[error("upstream rejected the request: {0}")]
    UpstreamRejected(String),

    #[error("internal adapter fault: {0}")]
    Internal(String),
}

impl InvokeError {
    /// The stable kind for this error, as surfaced to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvokeError::UnknownAgent(_) => ErrorKind::UnknownAgent,
            InvokeError::InvalidInput(_) => ErrorKind::InvalidInput,
            InvokeError::UpstreamTimeout { .. } => ErrorKind::UpstreamTimeout,
            InvokeError::UpstreamRateLimited { .. } => ErrorKind::UpstreamRateLimited,
            InvokeError::UpstreamRejected(_) => ErrorKind::UpstreamRejected,
            InvokeError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Whether this failure is transient and eligible for automatic retry
    /// under backoff. Only timeouts and rate limits qualify.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            InvokeError::UpstreamTimeout { .. } | InvokeError::UpstreamRateLimited { .. }
        )
    }

    /// Upstream-provided retry-after hint, when one exists.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            InvokeError::UpstreamRateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Errors raised while building the registry at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent '{0}' is already registered")]
    Duplicate(String),
}
