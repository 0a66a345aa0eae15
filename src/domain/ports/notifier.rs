use crate::domain::entities::decision::Decision;

/// External delivery channel for decisions that clear the confidence cutoff.
/// One attempt per decision; a failure is logged by the orchestrator and the
/// decision is never re-persisted or retried.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, decision: &Decision) -> Result<(), String>;
}
