#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use signalpipe::config::PipelineConfig;
use signalpipe::domain::entities::decision::Decision;
use signalpipe::domain::entities::observation::Observation;
use signalpipe::domain::ports::notifier::Notifier;
use signalpipe::domain::ports::reasoning::ReasoningBackend;
use signalpipe::domain::ports::source::{SourceAdapter, SourceBatch, SourceError};
use signalpipe::domain::values::retry::RetryPolicy;
use signalpipe::domain::values::source_kind::SourceKind;
use signalpipe::infrastructure::embeddings::hashing::HashingEmbedder;
use signalpipe::infrastructure::sqlite::migrations::run_migrations;
use signalpipe::SignalPipe;

pub fn hours_ago(n: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::hours(n)
}

pub fn obs(symbol: &str, text: &str, timestamp: DateTime<Utc>) -> Observation {
    Observation::new(SourceKind::Feed, symbol.into(), timestamp, text.into(), None)
}

pub fn decision_json(signal: &str, confidence: f64, rationale: &str) -> String {
    serde_json::json!({
        "signal": signal,
        "confidence": confidence,
        "rationale": rationale,
    })
    .to_string()
}

/// Source adapter serving a fixed set of observations, filtered by symbol
/// and the `since` cursor like the real adapters. Records every cursor it
/// was asked for, and can be told to fail its first N fetches.
pub struct ScriptedSource {
    observations: Vec<Observation>,
    fail_first: Mutex<usize>,
    always_malformed: bool,
    fetch_since: Mutex<Vec<DateTime<Utc>>>,
}

impl ScriptedSource {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self {
            observations,
            fail_first: Mutex::new(0),
            always_malformed: false,
            fetch_since: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = Mutex::new(n);
        self
    }

    pub fn malformed() -> Self {
        Self {
            observations: Vec::new(),
            fail_first: Mutex::new(0),
            always_malformed: true,
            fetch_since: Mutex::new(Vec::new()),
        }
    }

    pub fn fetch_since(&self) -> Vec<DateTime<Utc>> {
        self.fetch_since.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Feed
    }

    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, symbol: &str, since: DateTime<Utc>) -> Result<SourceBatch, SourceError> {
        self.fetch_since.lock().unwrap().push(since);
        if self.always_malformed {
            return Err(SourceError::Malformed("scripted garbage".into()));
        }
        {
            let mut remaining = self.fail_first.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SourceError::Unavailable("scripted outage".into()));
            }
        }
        Ok(SourceBatch::from_observations(
            self.observations
                .iter()
                .filter(|o| o.symbol == symbol && o.timestamp >= since)
                .cloned()
                .collect(),
        ))
    }
}

/// Reasoning backend replaying canned responses in order, then a fallback
/// forever. Counts invocations.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(fallback: String) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(signal: &str, confidence: f64) -> Self {
        Self::new(decision_json(signal, confidence, "scripted rationale"))
    }

    pub fn with_responses(self, responses: Vec<Result<String, String>>) -> Self {
        *self.responses.lock().unwrap() = responses.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.responses.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(self.fallback.clone()),
        }
    }

    fn fingerprint(&self) -> String {
        "scripted:v1".into()
    }
}

/// Notifier that just collects what it was asked to deliver.
#[derive(Default)]
pub struct CollectingNotifier {
    sent: Mutex<Vec<Decision>>,
}

impl CollectingNotifier {
    pub fn sent(&self) -> Vec<Decision> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    fn name(&self) -> &str {
        "collector"
    }

    async fn notify(&self, decision: &Decision) -> Result<(), String> {
        self.sent.lock().unwrap().push(decision.clone());
        Ok(())
    }
}

/// Config with backoff flattened so retry paths run in milliseconds, and a
/// single worker so in-memory shared-cache databases never contend.
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy::new(2, std::time::Duration::from_millis(1), 0.0),
        max_workers: 1,
        ..PipelineConfig::default()
    }
}

pub fn pipe_at(
    db_path: &str,
    source: Arc<ScriptedSource>,
    backend: Arc<ScriptedBackend>,
    notifier: Arc<CollectingNotifier>,
) -> SignalPipe {
    let sources: Vec<Arc<dyn SourceAdapter>> = vec![source];
    SignalPipe::with_providers(
        db_path,
        sources,
        Arc::new(HashingEmbedder),
        backend,
        notifier,
        test_config(),
    )
    .expect("pipeline wiring")
}

pub fn pipe(
    source: Arc<ScriptedSource>,
    backend: Arc<ScriptedBackend>,
    notifier: Arc<CollectingNotifier>,
) -> SignalPipe {
    pipe_at(":memory:", source, backend, notifier)
}

/// Fresh in-memory database with the schema applied, for repo-level tests.
pub fn mem_conn() -> rusqlite::Connection {
    let conn = rusqlite::Connection::open_in_memory().expect("open in-memory db");
    run_migrations(&conn).expect("migrations");
    conn
}
