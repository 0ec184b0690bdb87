//! Input canonicalization and cache-key derivation.
//!
//! Logically identical payloads must always hash identically: key order is
//! made irrelevant, surrounding whitespace in strings is stripped, and
//! explicit `null` members are treated the same as absent ones. Casing is
//! left intact — free-text fields are semantically case-sensitive to the
//! upstream models, and per-field knowledge belongs to the adapters.

use sha2::{Digest, Sha256};

/// Produce the canonical form of a payload.
pub fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(s.trim().to_string()),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        serde_json::Value::Object(map) => {
            // serde_json's default Map is a BTreeMap, so rebuilding the
            // object yields deterministic key order.
            let canonical: serde_json::Map<String, serde_json::Value> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            serde_json::Value::Object(canonical)
        }
        other => other.clone(),
    }
}

/// Derive the cache key for `(agent_id, payload)`: hex-encoded SHA-256 of
/// the agent id and the compact canonical JSON, separated by a byte that
/// cannot occur in either.
pub fn cache_key(agent_id: &str, payload: &serde_json::Value) -> String {
    let canonical = canonicalize(payload);
    let mut hasher = Sha256::new();
    hasher.update(agent_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
