use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One execution of the pipeline over a batch of symbols. Created RUNNING,
/// mutated only by the orchestrator, terminal once it leaves RUNNING.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    /// High-water observation timestamp; the next run fetches since here.
    pub cursor: Option<DateTime<Utc>>,
    pub report: RunReport,
}

impl Run {
    pub fn start() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            completed_at: None,
            status: RunStatus::Running,
            cursor: None,
            report: RunReport::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::Completed => write!(f, "COMPLETED"),
            RunStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RUNNING" => Ok(RunStatus::Running),
            "COMPLETED" => Ok(RunStatus::Completed),
            "FAILED" => Ok(RunStatus::Failed),
            _ => Err(format!("Unknown run status: {s}")),
        }
    }
}

/// What a finished run did. Reported even on partial success — per-item
/// failures show up in `items_skipped`, never silently.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub observations_processed: usize,
    pub decisions_emitted: usize,
    pub decisions_abstained: usize,
    pub items_skipped: usize,
    pub backend_calls: usize,
    pub cache_hits: usize,
    pub notifications_sent: usize,
}

impl RunReport {
    pub fn merge(&mut self, other: &RunReport) {
        self.observations_processed += other.observations_processed;
        self.decisions_emitted += other.decisions_emitted;
        self.decisions_abstained += other.decisions_abstained;
        self.items_skipped += other.items_skipped;
        self.backend_calls += other.backend_calls;
        self.cache_hits += other.cache_hits;
        self.notifications_sent += other.notifications_sent;
    }
}
