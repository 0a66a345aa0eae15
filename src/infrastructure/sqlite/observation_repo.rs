use chrono::DateTime;
use rusqlite::{params, Connection};
use std::sync::Mutex;

use crate::domain::entities::observation::Observation;
use crate::domain::error::PipelineError;
use crate::domain::ports::observation_repository::{ObservationFilter, ObservationRepository};
use crate::domain::values::sentiment::Sentiment;

const SELECT_COLS: &str =
    "id, source_kind, symbol, timestamp, raw_text, numeric_fields, sentiment_polarity, sentiment_confidence";

pub struct SqliteObservationRepo {
    conn: Mutex<Connection>,
}

impl SqliteObservationRepo {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn row_to_observation(row: &rusqlite::Row) -> Result<Observation, rusqlite::Error> {
        let kind_str: String = row.get(1)?;
        let ts_str: String = row.get(3)?;
        let numeric_str: Option<String> = row.get(5)?;
        let polarity: Option<f64> = row.get(6)?;
        let confidence: Option<f64> = row.get(7)?;

        let sentiment = match (polarity, confidence) {
            (Some(polarity), Some(confidence)) => Some(Sentiment { polarity, confidence }),
            _ => None,
        };

        Ok(Observation {
            id: row.get(0)?,
            source_kind: kind_str
                .parse()
                .map_err(|_| rusqlite::Error::InvalidParameterName(kind_str.clone()))?,
            symbol: row.get(2)?,
            timestamp: DateTime::parse_from_rfc3339(&ts_str)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|_| rusqlite::Error::InvalidParameterName(ts_str.clone()))?,
            raw_text: row.get(4)?,
            numeric_fields: numeric_str.and_then(|s| serde_json::from_str(&s).ok()),
            sentiment,
        })
    }
}

impl ObservationRepository for SqliteObservationRepo {
    fn record(&self, observation: &Observation) -> Result<bool, PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO observations
                 (id, source_kind, symbol, timestamp, raw_text, numeric_fields,
                  sentiment_polarity, sentiment_confidence, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    observation.id,
                    observation.source_kind.to_string(),
                    observation.symbol,
                    observation.timestamp.to_rfc3339(),
                    observation.raw_text,
                    observation
                        .numeric_fields
                        .as_ref()
                        .map(|m| serde_json::to_string(m).unwrap_or_default()),
                    observation.sentiment.map(|s| s.polarity),
                    observation.sentiment.map(|s| s.confidence),
                    chrono::Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| PipelineError::Database(format!("Failed to record observation: {e}")))?;
        Ok(inserted > 0)
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Observation>, PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let sql = format!("SELECT {SELECT_COLS} FROM observations WHERE id = ?1");
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let mut rows = stmt
            .query_map(params![id], Self::row_to_observation)
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        Ok(rows.next().and_then(|r| r.ok()))
    }

    fn query(&self, filter: &ObservationFilter) -> Result<Vec<Observation>, PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let mut sql = format!("SELECT {SELECT_COLS} FROM observations WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(symbol) = &filter.symbol {
            sql.push_str(&format!(" AND symbol = ?{}", param_values.len() + 1));
            param_values.push(Box::new(symbol.clone()));
        }
        if let Some(kind) = &filter.source_kind {
            sql.push_str(&format!(" AND source_kind = ?{}", param_values.len() + 1));
            param_values.push(Box::new(kind.to_string()));
        }
        if let Some(since) = &filter.since {
            sql.push_str(&format!(" AND timestamp >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(since.to_rfc3339()));
        }

        sql.push_str(" ORDER BY timestamp DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let observations = stmt
            .query_map(params_refs.as_slice(), Self::row_to_observation)
            .map_err(|e| PipelineError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(observations)
    }

    fn count(&self) -> Result<usize, PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        conn.query_row("SELECT COUNT(*) FROM observations", [], |r| r.get(0))
            .map_err(|e| PipelineError::Database(e.to_string()))
    }

    fn missing_vectors(&self) -> Result<Vec<Observation>, PipelineError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let sql = format!(
            "SELECT {SELECT_COLS} FROM observations WHERE id NOT IN (SELECT id FROM vectors)"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        let observations = stmt
            .query_map([], Self::row_to_observation)
            .map_err(|e| PipelineError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(observations)
    }
}
