//! Agent descriptors — the static per-agent policy record.

use std::time::Duration;

/// Static configuration describing one agent: its contract plus the
/// dispatch policy (timeout, retries, cache TTL) applied to every call.
///
/// Descriptors are created once at process start from configuration and
/// never mutated or deleted afterwards.
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    /// Unique agent id (e.g. "translator").
    pub id: String,

    /// Human-readable capability summary, surfaced in agent listings.
    pub description: String,

    /// JSON Schema documenting the input payload shape.
    pub input_schema: serde_json::Value,

    /// JSON Schema documenting the normalized output shape.
    pub output_schema: serde_json::Value,

    /// Budget for a single upstream attempt.
    pub timeout: Duration,

    /// How many times a retryable failure is retried (total attempts are
    /// `retry_count + 1`).
    pub retry_count: u32,

    /// How long a successful result stays servable from the cache.
    pub cache_ttl: Duration,
}

impl AgentDescriptor {
    /// Upper bound on the wall-clock spent on one request: every attempt
    /// at full timeout. Backoff sleeps must fit inside whatever remains.
    pub fn overall_deadline(&self) -> Duration {
        self.timeout * (self.retry_count + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(timeout_secs: u64, retry_count: u32) -> AgentDescriptor {
        AgentDescriptor {
            id: "insight".into(),
            description: "Market insight".into(),
            input_schema: serde_json::json!({"type": "object"}),
            output_schema: serde_json::json!({"type": "object"}),
            timeout: Duration::from_secs(timeout_secs),
            retry_count,
            cache_ttl: Duration::from_secs(60),
        }
    }

    #[test]
    fn overall_deadline_covers_all_attempts() {
        assert_eq!(descriptor(10, 2).overall_deadline(), Duration::from_secs(30));
        assert_eq!(descriptor(5, 0).overall_deadline(), Duration::from_secs(5));
    }
}
