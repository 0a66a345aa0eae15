use chrono::DateTime;
use rusqlite::{params, Connection};
use std::sync::Mutex;

use crate::domain::entities::decision::Decision;
use crate::domain::entities::observation::Observation;
use crate::domain::error::PipelineError;
use crate::domain::ports::decision_repository::{DecisionRepository, SaveOutcome};
use crate::domain::values::confidence::Confidence;

const SELECT_COLS: &str = "id, idempotency_key, request_fingerprint, run_id, symbol, signal, \
                           confidence, rationale_text, model_fingerprint, created_at";

pub struct SqliteDecisionRepo {
    conn: Mutex<Connection>,
}

impl SqliteDecisionRepo {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn row_to_decision(row: &rusqlite::Row) -> Result<Decision, rusqlite::Error> {
        let signal_str: String = row.get(5)?;
        let confidence_val: f64 = row.get(6)?;
        let created_str: String = row.get(9)?;

        Ok(Decision {
            id: row.get(0)?,
            idempotency_key: row.get(1)?,
            request_fingerprint: row.get(2)?,
            run_id: row.get(3)?,
            symbol: row.get(4)?,
            signal: signal_str
                .parse()
                .map_err(|_| rusqlite::Error::InvalidParameterName(signal_str.clone()))?,
            confidence: Confidence::new(confidence_val.clamp(0.0, 1.0))
                .unwrap_or_else(|_| Confidence::zero()),
            rationale_text: row.get(7)?,
            model_fingerprint: row.get(8)?,
            created_at: DateTime::parse_from_rfc3339(&created_str)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|_| rusqlite::Error::InvalidParameterName(created_str.clone()))?,
        })
    }

    fn get_by_key(conn: &Connection, idempotency_key: &str) -> Option<Decision> {
        let sql = format!("SELECT {SELECT_COLS} FROM decisions WHERE idempotency_key = ?1");
        conn.query_row(&sql, params![idempotency_key], Self::row_to_decision)
            .ok()
    }
}

impl DecisionRepository for SqliteDecisionRepo {
    fn save(
        &self,
        decision: &Decision,
        provenance: &[Observation],
    ) -> Result<SaveOutcome, PipelineError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;

        // A duplicate key means an equivalent decision was already delivered;
        // hand it back instead of writing anything.
        if let Some(existing) = Self::get_by_key(&conn, &decision.idempotency_key) {
            return Ok(SaveOutcome::AlreadyDelivered(existing));
        }

        // Decision and its provenance land atomically or not at all.
        let tx = conn
            .transaction()
            .map_err(|e| PipelineError::Database(e.to_string()))?;

        for obs in provenance {
            tx.execute(
                "INSERT OR IGNORE INTO observations
                 (id, source_kind, symbol, timestamp, raw_text, numeric_fields,
                  sentiment_polarity, sentiment_confidence, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    obs.id,
                    obs.source_kind.to_string(),
                    obs.symbol,
                    obs.timestamp.to_rfc3339(),
                    obs.raw_text,
                    obs.numeric_fields
                        .as_ref()
                        .map(|m| serde_json::to_string(m).unwrap_or_default()),
                    obs.sentiment.map(|s| s.polarity),
                    obs.sentiment.map(|s| s.confidence),
                    chrono::Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| PipelineError::Database(format!("Failed to persist provenance: {e}")))?;
        }

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO decisions
                 (id, idempotency_key, request_fingerprint, run_id, symbol, signal,
                  confidence, rationale_text, model_fingerprint, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    decision.id,
                    decision.idempotency_key,
                    decision.request_fingerprint,
                    decision.run_id,
                    decision.symbol,
                    decision.signal.to_string(),
                    decision.confidence.value(),
                    decision.rationale_text,
                    decision.model_fingerprint,
                    decision.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| PipelineError::Database(format!("Failed to save decision: {e}")))?;

        tx.commit()
            .map_err(|e| PipelineError::Database(e.to_string()))?;

        if inserted > 0 {
            Ok(SaveOutcome::Saved(decision.clone()))
        } else {
            // Raced another writer on the same key between check and insert.
            let existing = Self::get_by_key(&conn, &decision.idempotency_key)
                .ok_or_else(|| PipelineError::Database("duplicate key vanished".into()))?;
            Ok(SaveOutcome::AlreadyDelivered(existing))
        }
    }

    fn exists(&self, idempotency_key: &str) -> Result<bool, PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM decisions WHERE idempotency_key = ?1",
                params![idempotency_key],
                |r| r.get(0),
            )
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    fn find_cached(
        &self,
        request_fingerprint: &str,
        ttl: chrono::Duration,
    ) -> Result<Option<Decision>, PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let oldest = (chrono::Utc::now() - ttl).to_rfc3339();
        let sql = format!(
            "SELECT {SELECT_COLS} FROM decisions
             WHERE request_fingerprint = ?1 AND created_at >= ?2
             ORDER BY created_at DESC LIMIT 1"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let mut rows = stmt
            .query_map(params![request_fingerprint, oldest], Self::row_to_decision)
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        Ok(rows.next().and_then(|r| r.ok()))
    }

    fn list(&self, symbol: Option<&str>, limit: usize) -> Result<Vec<Decision>, PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let (sql, params): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match symbol {
            Some(symbol) => (
                format!(
                    "SELECT {SELECT_COLS} FROM decisions WHERE symbol = ?1
                     ORDER BY created_at DESC LIMIT ?2"
                ),
                vec![Box::new(symbol.to_string()), Box::new(limit as i64)],
            ),
            None => (
                format!("SELECT {SELECT_COLS} FROM decisions ORDER BY created_at DESC LIMIT ?1"),
                vec![Box::new(limit as i64)],
            ),
        };
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let decisions = stmt
            .query_map(params_refs.as_slice(), Self::row_to_decision)
            .map_err(|e| PipelineError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(decisions)
    }

    fn count(&self) -> Result<usize, PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        conn.query_row("SELECT COUNT(*) FROM decisions", [], |r| r.get(0))
            .map_err(|e| PipelineError::Database(e.to_string()))
    }
}
