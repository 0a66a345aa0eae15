use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::observation::Observation;
use crate::domain::values::source_kind::SourceKind;

/// A source adapter normalizes one external data source into observations.
///
/// `fetch` is finite per call and restartable via the `since` cursor;
/// fetching the same window twice must yield observations whose content-hash
/// ids collapse identically. Item-level parse failures are skipped inside
/// the adapter (counted in the returned batch's `malformed`), never retried.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Human-readable adapter name for logs.
    fn name(&self) -> &str;

    async fn fetch(&self, symbol: &str, since: DateTime<Utc>) -> Result<SourceBatch, SourceError>;
}

/// One fetch window's worth of normalized observations.
#[derive(Debug, Default)]
pub struct SourceBatch {
    pub observations: Vec<Observation>,
    /// Items dropped because their payload was unparsable.
    pub malformed: usize,
}

impl SourceBatch {
    pub fn from_observations(observations: Vec<Observation>) -> Self {
        Self { observations, malformed: 0 }
    }
}

#[derive(Debug)]
pub enum SourceError {
    /// Transport failure; transient, retried with backoff by the caller.
    Unavailable(String),
    /// The whole payload was unparsable; permanent for this window.
    Malformed(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Unavailable(msg) => write!(f, "Source unavailable: {msg}"),
            SourceError::Malformed(msg) => write!(f, "Source malformed: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}
