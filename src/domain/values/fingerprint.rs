//! Deterministic identity hashes. Observations are identified by content so
//! re-fetches of the same window collapse; decisions are identified by the
//! exact input set so replayed runs never double-deliver.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::domain::values::source_kind::SourceKind;

/// Content hash identifying an observation: same source item fetched twice
/// yields the same id.
pub fn observation_id(
    kind: SourceKind,
    symbol: &str,
    timestamp: &DateTime<Utc>,
    raw_text: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.to_string().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(symbol.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(timestamp.to_rfc3339().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(raw_text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Idempotency key of a decision: hash of (symbol, sorted observation ids,
/// model fingerprint). The decision store enforces uniqueness on this.
pub fn idempotency_key(symbol: &str, observation_ids: &[String], model: &str) -> String {
    let mut ids: Vec<&str> = observation_ids.iter().map(|s| s.as_str()).collect();
    ids.sort_unstable();
    let mut hasher = Sha256::new();
    hasher.update(symbol.as_bytes());
    hasher.update(b"\x1f");
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\x1e");
    }
    hasher.update(model.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cache fingerprint of one reasoning invocation: the idempotency inputs
/// plus the retrieved context window ids.
pub fn request_fingerprint(
    symbol: &str,
    observation_ids: &[String],
    context_ids: &[String],
    model: &str,
) -> String {
    let mut obs: Vec<&str> = observation_ids.iter().map(|s| s.as_str()).collect();
    obs.sort_unstable();
    let mut hasher = Sha256::new();
    hasher.update(symbol.as_bytes());
    hasher.update(b"\x1f");
    for id in obs {
        hasher.update(id.as_bytes());
        hasher.update(b"\x1e");
    }
    hasher.update(b"\x1f");
    for id in context_ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\x1e");
    }
    hasher.update(model.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_id_is_content_deterministic() {
        let ts = Utc::now();
        let a = observation_id(SourceKind::Feed, "ABC", &ts, "strong earnings beat");
        let b = observation_id(SourceKind::Feed, "ABC", &ts, "strong earnings beat");
        let c = observation_id(SourceKind::Feed, "ABC", &ts, "weak earnings miss");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn idempotency_key_ignores_observation_order() {
        let ids = vec!["b".to_string(), "a".to_string()];
        let rev = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            idempotency_key("ABC", &ids, "m1"),
            idempotency_key("ABC", &rev, "m1")
        );
        assert_ne!(
            idempotency_key("ABC", &ids, "m1"),
            idempotency_key("ABC", &ids, "m2")
        );
    }

    #[test]
    fn request_fingerprint_varies_with_context() {
        let obs = vec!["a".to_string()];
        let with = request_fingerprint("ABC", &obs, &["ctx1".to_string()], "m1");
        let without = request_fingerprint("ABC", &obs, &[], "m1");
        assert_ne!(with, without);
    }
}
