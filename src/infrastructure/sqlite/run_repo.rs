use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::Mutex;

use crate::domain::entities::run::{Run, RunReport, RunStatus};
use crate::domain::error::PipelineError;
use crate::domain::ports::run_repository::RunRepository;

const SELECT_COLS: &str = "id, started_at, completed_at, status, cursor, report";

pub struct SqliteRunRepo {
    conn: Mutex<Connection>,
}

impl SqliteRunRepo {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn row_to_run(row: &rusqlite::Row) -> Result<Run, rusqlite::Error> {
        let started_str: String = row.get(1)?;
        let completed_str: Option<String> = row.get(2)?;
        let status_str: String = row.get(3)?;
        let cursor_str: Option<String> = row.get(4)?;
        let report_str: String = row.get(5)?;

        Ok(Run {
            id: row.get(0)?,
            started_at: parse_ts(&started_str)?,
            completed_at: completed_str.as_deref().map(parse_ts).transpose()?,
            status: status_str
                .parse()
                .map_err(|_| rusqlite::Error::InvalidParameterName(status_str.clone()))?,
            cursor: cursor_str.as_deref().map(parse_ts).transpose()?,
            report: serde_json::from_str(&report_str).unwrap_or_default(),
        })
    }
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| rusqlite::Error::InvalidParameterName(s.to_string()))
}

impl RunRepository for SqliteRunRepo {
    fn create(&self, run: &Run) -> Result<(), PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO runs (id, started_at, completed_at, status, cursor, report)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run.id,
                run.started_at.to_rfc3339(),
                run.completed_at.map(|dt| dt.to_rfc3339()),
                run.status.to_string(),
                run.cursor.map(|dt| dt.to_rfc3339()),
                serde_json::to_string(&run.report).unwrap_or_else(|_| "{}".into()),
            ],
        )
        .map_err(|e| PipelineError::Database(format!("Failed to create run: {e}")))?;
        Ok(())
    }

    fn finish(
        &self,
        run_id: &str,
        status: RunStatus,
        cursor: Option<DateTime<Utc>>,
        report: &RunReport,
    ) -> Result<(), PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let updated = conn
            .execute(
                "UPDATE runs SET status = ?1, completed_at = ?2, cursor = ?3, report = ?4
                 WHERE id = ?5 AND status = 'RUNNING'",
                params![
                    status.to_string(),
                    Utc::now().to_rfc3339(),
                    cursor.map(|dt| dt.to_rfc3339()),
                    serde_json::to_string(report).unwrap_or_else(|_| "{}".into()),
                    run_id,
                ],
            )
            .map_err(|e| PipelineError::Database(format!("Failed to finish run: {e}")))?;
        if updated == 0 {
            return Err(PipelineError::Database(format!(
                "Run {run_id} not found or already terminal"
            )));
        }
        Ok(())
    }

    fn get(&self, run_id: &str) -> Result<Option<Run>, PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let sql = format!("SELECT {SELECT_COLS} FROM runs WHERE id = ?1");
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let mut rows = stmt
            .query_map(params![run_id], Self::row_to_run)
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        Ok(rows.next().and_then(|r| r.ok()))
    }

    fn list(&self, limit: usize) -> Result<Vec<Run>, PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let sql = format!("SELECT {SELECT_COLS} FROM runs ORDER BY started_at DESC LIMIT ?1");
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let runs = stmt
            .query_map(params![limit as i64], Self::row_to_run)
            .map_err(|e| PipelineError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(runs)
    }

    fn count(&self) -> Result<usize, PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        conn.query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))
            .map_err(|e| PipelineError::Database(e.to_string()))
    }

    fn last_completed_cursor(&self) -> Result<Option<DateTime<Utc>>, PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let cursor: Option<Option<String>> = conn
            .query_row(
                "SELECT cursor FROM runs WHERE status = 'COMPLETED'
                 ORDER BY completed_at DESC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(PipelineError::Database(other.to_string())),
            })?;
        match cursor.flatten() {
            Some(s) => parse_ts(&s)
                .map(Some)
                .map_err(|e| PipelineError::Database(e.to_string())),
            None => Ok(None),
        }
    }
}
