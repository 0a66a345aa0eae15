use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::values::confidence::Confidence;
use crate::domain::values::signal::Signal;

/// One emitted trading signal with confidence and rationale.
///
/// `idempotency_key` hashes (symbol, input observation set, model
/// fingerprint); the persistence store enforces uniqueness on it so a
/// decision for equivalent inputs is delivered at most once.
/// `request_fingerprint` additionally hashes the retrieved context window
/// and keys the decision cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub run_id: String,
    pub symbol: String,
    pub signal: Signal,
    pub confidence: Confidence,
    pub rationale_text: String,
    pub model_fingerprint: String,
    pub idempotency_key: String,
    pub request_fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl Decision {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: String,
        symbol: String,
        signal: Signal,
        confidence: Confidence,
        rationale_text: String,
        model_fingerprint: String,
        idempotency_key: String,
        request_fingerprint: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id,
            symbol,
            signal,
            confidence,
            rationale_text,
            model_fingerprint,
            idempotency_key,
            request_fingerprint,
            created_at: Utc::now(),
        }
    }

    /// Terminal decision recorded when the backend never produced a valid
    /// payload: abstain with zero confidence, rationale = what failed.
    #[allow(clippy::too_many_arguments)]
    pub fn abstained(
        run_id: String,
        symbol: String,
        failure: String,
        model_fingerprint: String,
        idempotency_key: String,
        request_fingerprint: String,
    ) -> Self {
        Self::new(
            run_id,
            symbol,
            Signal::Abstain,
            Confidence::zero(),
            failure,
            model_fingerprint,
            idempotency_key,
            request_fingerprint,
        )
    }
}

/// The structured payload the reasoning backend is asked to return.
/// Parsed from the raw response and validated before it becomes a Decision.
#[derive(Debug, Deserialize)]
pub struct DecisionPayload {
    pub signal: String,
    pub confidence: f64,
    pub rationale: String,
}

impl DecisionPayload {
    /// Validate against the decision schema: known signal, confidence in
    /// range, non-empty rationale.
    pub fn validate(&self) -> Result<(Signal, Confidence, String), String> {
        let signal: Signal = self.signal.parse()?;
        let confidence = Confidence::new(self.confidence)?;
        let rationale = self.rationale.trim();
        if rationale.is_empty() {
            return Err("rationale must be non-empty".to_string());
        }
        Ok((signal, confidence, rationale.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_validation_rejects_bad_values() {
        let bad_signal = DecisionPayload {
            signal: "MOON".into(),
            confidence: 0.5,
            rationale: "r".into(),
        };
        assert!(bad_signal.validate().is_err());

        let bad_confidence = DecisionPayload {
            signal: "BUY".into(),
            confidence: 1.5,
            rationale: "r".into(),
        };
        assert!(bad_confidence.validate().is_err());

        let empty_rationale = DecisionPayload {
            signal: "BUY".into(),
            confidence: 0.5,
            rationale: "  ".into(),
        };
        assert!(empty_rationale.validate().is_err());

        let ok = DecisionPayload {
            signal: "hold".into(),
            confidence: 0.72,
            rationale: "rangebound".into(),
        };
        let (signal, confidence, _) = ok.validate().unwrap();
        assert_eq!(signal, Signal::Hold);
        assert!((confidence.value() - 0.72).abs() < 1e-9);
    }
}
