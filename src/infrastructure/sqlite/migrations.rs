use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS observations (
            id TEXT PRIMARY KEY,
            source_kind TEXT NOT NULL,
            symbol TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            raw_text TEXT NOT NULL,
            numeric_fields TEXT,
            sentiment_polarity REAL,
            sentiment_confidence REAL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS decisions (
            id TEXT PRIMARY KEY,
            idempotency_key TEXT NOT NULL UNIQUE,
            request_fingerprint TEXT NOT NULL,
            run_id TEXT NOT NULL,
            symbol TEXT NOT NULL,
            signal TEXT NOT NULL,
            confidence REAL NOT NULL,
            rationale_text TEXT NOT NULL,
            model_fingerprint TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS runs (
            id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            status TEXT NOT NULL,
            cursor TEXT,
            report TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS vectors (
            id TEXT PRIMARY KEY,
            vector BLOB NOT NULL,
            model TEXT NOT NULL,
            stored_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_observations_symbol ON observations(symbol, timestamp);
        CREATE INDEX IF NOT EXISTS idx_observations_kind ON observations(source_kind);
        CREATE INDEX IF NOT EXISTS idx_decisions_fingerprint ON decisions(request_fingerprint, created_at);
        CREATE INDEX IF NOT EXISTS idx_decisions_symbol ON decisions(symbol);
        CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status, completed_at);
        ",
    )
    .map_err(|e| format!("Migration failed: {e}"))
}
