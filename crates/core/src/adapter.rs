//! Adapter trait — the abstraction over backing capabilities.
//!
//! An Adapter wraps one upstream model/API behind a uniform contract: a
//! cheap local `validate`, then `invoke` for exactly one upstream attempt.
//! Retry policy lives in the dispatcher so it is uniform and observable in
//! one place; an adapter must never retry internally.
//!
//! Implementations: market insight, idea generation, translation.

use async_trait::async_trait;

use crate::error::InvokeError;

/// The core Adapter trait.
///
/// The dispatcher calls `validate()` before anything touches the network
/// and `invoke()` once per attempt, under the descriptor's timeout. Every
/// upstream failure must come back as a classified [`InvokeError`] — the
/// adapter is the only component that knows its upstream's failure
/// vocabulary.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// The unique agent id this adapter serves (e.g. "translator").
    fn agent_id(&self) -> &str;

    /// Human-readable capability summary for listings.
    fn description(&self) -> &str;

    /// JSON Schema describing the accepted input payload.
    fn input_schema(&self) -> serde_json::Value;

    /// JSON Schema describing the normalized output payload.
    fn output_schema(&self) -> serde_json::Value;

    /// Validate a raw payload against this agent's input contract.
    ///
    /// Must be cheap, synchronous, and never touch the network. Returns
    /// `InvalidInput` for contract violations, or `UpstreamRejected` for
    /// domain-level rejections decidable locally (e.g. an unsupported
    /// target language on a static allow-list).
    fn validate(&self, payload: &serde_json::Value) -> Result<(), InvokeError>;

    /// Perform exactly one upstream attempt and return the normalized
    /// output. The returned value always matches `output_schema` — the
    /// adapter parses the upstream response into its typed output before
    /// serializing it back out.
    async fn invoke(&self, payload: serde_json::Value)
    -> Result<serde_json::Value, InvokeError>;
}
