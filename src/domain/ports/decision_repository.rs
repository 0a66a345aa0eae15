use crate::domain::entities::decision::Decision;
use crate::domain::entities::observation::Observation;
use crate::domain::error::PipelineError;

/// Outcome of persisting a decision. A duplicate idempotency key is not an
/// error: the caller gets the previously stored decision and must not
/// re-deliver it.
#[derive(Debug)]
pub enum SaveOutcome {
    Saved(Decision),
    AlreadyDelivered(Decision),
}

pub trait DecisionRepository: Send + Sync {
    /// Persist a decision together with its triggering observations in one
    /// transaction, so a crash mid-write never leaves a decision without
    /// provenance.
    fn save(
        &self,
        decision: &Decision,
        provenance: &[Observation],
    ) -> Result<SaveOutcome, PipelineError>;

    fn exists(&self, idempotency_key: &str) -> Result<bool, PipelineError>;

    /// Most recent decision with this request fingerprint no older than
    /// `ttl`; the decision-cache lookup.
    fn find_cached(
        &self,
        request_fingerprint: &str,
        ttl: chrono::Duration,
    ) -> Result<Option<Decision>, PipelineError>;

    fn list(&self, symbol: Option<&str>, limit: usize) -> Result<Vec<Decision>, PipelineError>;

    fn count(&self) -> Result<usize, PipelineError>;
}
