use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::values::fingerprint::observation_id;
use crate::domain::values::sentiment::Sentiment;
use crate::domain::values::source_kind::SourceKind;

/// One normalized unit of input data: a market fact, news item, or social
/// post. Immutable once created; the id is a content hash so identical
/// inputs from re-fetches collapse to the same identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub source_kind: SourceKind,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub raw_text: String,
    /// Source-specific numeric payload (price, change_pct, volume, ...).
    pub numeric_fields: Option<serde_json::Value>,
    /// Filled in by the sentiment stage; None until scored.
    pub sentiment: Option<Sentiment>,
}

impl Observation {
    pub fn new(
        source_kind: SourceKind,
        symbol: String,
        timestamp: DateTime<Utc>,
        raw_text: String,
        numeric_fields: Option<serde_json::Value>,
    ) -> Self {
        let id = observation_id(source_kind, &symbol, &timestamp, &raw_text);
        Self {
            id,
            source_kind,
            symbol,
            timestamp,
            raw_text,
            numeric_fields,
            sentiment: None,
        }
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    /// Text representation used for embedding.
    pub fn embeddable_text(&self) -> String {
        format!("{} {}", self.symbol, self.raw_text)
    }
}
