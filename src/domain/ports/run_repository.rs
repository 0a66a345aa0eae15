use chrono::{DateTime, Utc};

use crate::domain::entities::run::{Run, RunReport, RunStatus};
use crate::domain::error::PipelineError;

pub trait RunRepository: Send + Sync {
    fn create(&self, run: &Run) -> Result<(), PipelineError>;

    /// Move a run out of RUNNING. Terminal; called exactly once per run.
    fn finish(
        &self,
        run_id: &str,
        status: RunStatus,
        cursor: Option<DateTime<Utc>>,
        report: &RunReport,
    ) -> Result<(), PipelineError>;

    fn get(&self, run_id: &str) -> Result<Option<Run>, PipelineError>;

    fn list(&self, limit: usize) -> Result<Vec<Run>, PipelineError>;

    fn count(&self) -> Result<usize, PipelineError>;

    /// Cursor of the most recent COMPLETED run; where a resumed pipeline
    /// picks up fetching.
    fn last_completed_cursor(&self) -> Result<Option<DateTime<Utc>>, PipelineError>;
}
