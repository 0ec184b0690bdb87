//! The dispatcher — the one path every marketplace request takes.
//!
//! `handle()` looks up the agent, validates the payload, consults the
//! response cache, and only then invokes the adapter under the
//! descriptor's timeout with bounded retry/backoff. Cheap failures never
//! touch the network; upstream failures come back with their adapter-
//! assigned kind unchanged.
//!
//! The dispatcher holds no mutable state between calls — any number of
//! concurrent `handle()` calls share it behind an `Arc`, and the only
//! shared mutation goes through the cache's own locking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, error, warn};

use agora_cache::{CachedResponse, ResponseCache};
use agora_core::canonical::cache_key;
use agora_core::error::{ErrorKind, InvokeError};
use agora_core::invocation::{AgentRequest, AgentResult};
use agora_core::registry::{AgentRegistry, RegisteredAgent};

/// Exponential backoff with full jitter on the upper half of each step.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first retry; doubles per attempt.
    pub base_delay: Duration,
    /// Ceiling on any single computed delay.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &agora_config::BackoffConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`
    /// capped at `max_delay`, jittered into `[cap/2, cap]` so synchronized
    /// clients spread out.
    fn delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let cap_ms = exponential.as_millis() as u64;
        let floor_ms = cap_ms / 2;
        let jittered = floor_ms + rand::rng().random_range(0..=cap_ms - floor_ms);
        Duration::from_millis(jittered)
    }
}

/// The dispatcher. Construct once at startup and share via `Arc`.
pub struct Dispatcher {
    registry: Arc<AgentRegistry>,
    cache: Arc<ResponseCache>,
    backoff: BackoffPolicy,
}

impl Dispatcher {
    pub fn new(registry: Arc<AgentRegistry>, cache: Arc<ResponseCache>) -> Self {
        Self {
            registry,
            cache,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Handle one request end to end. Always returns a result — failures
    /// are classified, never panics or transport-level errors.
    pub async fn handle(&self, request: AgentRequest) -> AgentResult {
        // 1. Lookup. A miss is terminal; nothing is attempted upstream.
        let agent = match self.registry.lookup(&request.agent_id) {
            Ok(agent) => agent,
            Err(err) => {
                warn!(agent = %request.agent_id, "request for unknown agent");
                return AgentResult::failure(&err, false);
            }
        };

        // 2. Validate locally. Invalid payloads never cost an upstream call.
        if let Err(err) = agent.adapter.validate(&request.payload) {
            debug!(agent = %request.agent_id, error = %err, "payload rejected before dispatch");
            return AgentResult::failure(&err, false);
        }

        // 3. Cache read on the canonical key.
        let key = cache_key(&request.agent_id, &request.payload);
        if let Some(hit) = self.cache.get(&key) {
            debug!(agent = %request.agent_id, "cache hit");
            return AgentResult::success(hit.output, hit.latency_ms, true);
        }

        // 4. Invoke under the descriptor's policy.
        let started = Instant::now();
        match self.invoke_with_retry(agent, &request).await {
            Ok(output) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                // 5. Write-through: success only, atomic under the cache lock.
                self.cache.put(
                    &key,
                    CachedResponse {
                        output: output.clone(),
                        latency_ms,
                    },
                    agent.descriptor.cache_ttl,
                );
                AgentResult::success(output, latency_ms, false)
            }
            // 6. Whether retries were exhausted or the error short-circuited,
            // retrying immediately is futile.
            Err(err) => AgentResult::failure(&err, false),
        }
    }

    /// Run adapter attempts until success, a non-retryable failure, the
    /// retry budget, or the overall deadline — whichever comes first.
    async fn invoke_with_retry(
        &self,
        agent: &RegisteredAgent,
        request: &AgentRequest,
    ) -> Result<serde_json::Value, InvokeError> {
        let descriptor = &agent.descriptor;
        let deadline = Instant::now() + descriptor.overall_deadline();
        let mut attempt: u32 = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let budget = descriptor.timeout.min(remaining);
            if budget.is_zero() {
                return Err(InvokeError::UpstreamTimeout {
                    timeout_ms: descriptor.overall_deadline().as_millis() as u64,
                });
            }

            let outcome =
                tokio::time::timeout(budget, agent.adapter.invoke(request.payload.clone())).await;

            let err = match outcome {
                Ok(Ok(output)) => return Ok(output),
                Ok(Err(err)) => err,
                // Exceeding the budget is our classification, not the
                // upstream's: a retryable infrastructure error.
                Err(_) => InvokeError::UpstreamTimeout {
                    timeout_ms: budget.as_millis() as u64,
                },
            };

            if err.kind() == ErrorKind::InternalError {
                error!(agent = %descriptor.id, attempt, error = %err, "adapter fault");
            }

            if !err.retryable() || attempt >= descriptor.retry_count {
                return Err(err);
            }

            let delay = err
                .retry_after()
                .unwrap_or_else(|| self.backoff.delay(attempt));
            let remaining = deadline.saturating_duration_since(Instant::now());
            if delay >= remaining {
                // No room for another attempt inside the deadline.
                return Err(err);
            }

            warn!(
                agent = %descriptor.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying after backoff"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
