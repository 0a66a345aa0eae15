use serde::{Deserialize, Serialize};

/// Sentiment of a text observation: polarity in [-1, 1] plus a confidence
/// in [0, 1]. `(0, 0)` means "no signal" and is what empty input scores as.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub polarity: f64,
    pub confidence: f64,
}

impl Sentiment {
    pub fn new(polarity: f64, confidence: f64) -> Result<Self, String> {
        if !(-1.0..=1.0).contains(&polarity) {
            return Err(format!("Polarity must be in [-1, 1], got {polarity}"));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(format!("Confidence must be in [0, 1], got {confidence}"));
        }
        Ok(Self { polarity, confidence })
    }

    pub fn neutral() -> Self {
        Self { polarity: 0.0, confidence: 0.0 }
    }
}

impl Default for Sentiment {
    fn default() -> Self {
        Self::neutral()
    }
}
