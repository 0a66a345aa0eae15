use chrono::{DateTime, Utc};

use crate::domain::entities::observation::Observation;
use crate::domain::error::PipelineError;
use crate::domain::values::source_kind::SourceKind;

#[derive(Debug, Default)]
pub struct ObservationFilter {
    pub symbol: Option<String>,
    pub source_kind: Option<SourceKind>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

pub trait ObservationRepository: Send + Sync {
    /// Idempotent upsert keyed by content-hash id. Returns true if the
    /// observation was new, false if it had been recorded before.
    fn record(&self, observation: &Observation) -> Result<bool, PipelineError>;

    fn get_by_id(&self, id: &str) -> Result<Option<Observation>, PipelineError>;

    fn query(&self, filter: &ObservationFilter) -> Result<Vec<Observation>, PipelineError>;

    fn count(&self) -> Result<usize, PipelineError>;

    /// Observations not yet present in the vector index; re-embedding feed.
    fn missing_vectors(&self) -> Result<Vec<Observation>, PipelineError>;
}
