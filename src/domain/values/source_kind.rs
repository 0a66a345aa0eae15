use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of source adapter kinds. New sources are added by adding a
/// variant and an adapter implementation, never by runtime type probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Market screener snapshot (price/volume/change rows per symbol)
    Screener,
    /// News or press-release feed items
    Feed,
    /// Social sentiment posts (forums, boards)
    Social,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Screener => write!(f, "screener"),
            SourceKind::Feed => write!(f, "feed"),
            SourceKind::Social => write!(f, "social"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "screener" => Ok(SourceKind::Screener),
            "feed" => Ok(SourceKind::Feed),
            "social" => Ok(SourceKind::Social),
            _ => Err(format!("Unknown source kind: {s}")),
        }
    }
}
