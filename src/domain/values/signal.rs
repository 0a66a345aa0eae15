use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trading signal emitted by the decision engine. `Abstain` is the terminal
/// outcome when the backend cannot produce a valid decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
    Abstain,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
            Signal::Abstain => write!(f, "ABSTAIN"),
        }
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(Signal::Buy),
            "SELL" => Ok(Signal::Sell),
            "HOLD" => Ok(Signal::Hold),
            "ABSTAIN" => Ok(Signal::Abstain),
            _ => Err(format!("Unknown signal: {s}. Use BUY, SELL, HOLD or ABSTAIN")),
        }
    }
}
