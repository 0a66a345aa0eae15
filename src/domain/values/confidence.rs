use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence of a decision, constrained to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Result<Self, String> {
        if !(0.0..=1.0).contains(&value) {
            return Err(format!(
                "Confidence must be between 0.0 and 1.0, got {value}"
            ));
        }
        Ok(Confidence(value))
    }

    /// Confidence of an abstained decision.
    pub fn zero() -> Self {
        Confidence(0.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whether this decision clears the delivery cutoff.
    pub fn clears(&self, threshold: f64) -> bool {
        self.0 >= threshold
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
