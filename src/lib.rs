pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

use std::sync::Arc;

use rusqlite::Connection;
use serde::Serialize;

use crate::application::context::ContextBuilder;
use crate::application::engine::DecisionEngine;
use crate::application::orchestrator::{CancelHandle, Orchestrator};
use crate::config::PipelineConfig;
use crate::domain::entities::decision::Decision;
use crate::domain::entities::run::Run;
use crate::domain::error::PipelineError;
use crate::domain::ports::decision_repository::DecisionRepository;
use crate::domain::ports::embedding::{EmbeddingProvider, InputType};
use crate::domain::ports::notifier::Notifier;
use crate::domain::ports::observation_repository::ObservationRepository;
use crate::domain::ports::reasoning::ReasoningBackend;
use crate::domain::ports::run_repository::RunRepository;
use crate::domain::ports::source::SourceAdapter;
use crate::domain::ports::vector_store::VectorStore;
use crate::infrastructure::embeddings::hashing::HashingEmbedder;
use crate::infrastructure::embeddings::openai::OpenAiEmbedder;
use crate::infrastructure::notify::log::LogNotifier;
use crate::infrastructure::notify::webhook::WebhookNotifier;
use crate::infrastructure::reasoning::openai::OpenAiBackend;
use crate::infrastructure::sources::feed::NewsFeedSource;
use crate::infrastructure::sources::screener::ScreenerSource;
use crate::infrastructure::sources::social::SocialSource;
use crate::infrastructure::sqlite::decision_repo::SqliteDecisionRepo;
use crate::infrastructure::sqlite::migrations::run_migrations;
use crate::infrastructure::sqlite::observation_repo::SqliteObservationRepo;
use crate::infrastructure::sqlite::run_repo::SqliteRunRepo;
use crate::infrastructure::sqlite::vector_store::SqliteVectorStore;

#[derive(Debug, Serialize)]
pub struct PipeStats {
    pub total_observations: usize,
    pub total_decisions: usize,
    pub total_runs: usize,
}

/// The assembled pipeline: repositories, providers and use cases wired over
/// one SQLite database.
pub struct SignalPipe {
    orchestrator: Arc<Orchestrator>,
    observations: Arc<dyn ObservationRepository>,
    decisions: Arc<dyn DecisionRepository>,
    runs: Arc<dyn RunRepository>,
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SignalPipe {
    /// Wire from environment: `SIGNALPIPE_EMBEDDING_PROVIDER`
    /// (openai|hashing), `SIGNALPIPE_OPENAI_API_KEY`,
    /// `SIGNALPIPE_EMBEDDING_MODEL`, `SIGNALPIPE_REASONING_MODEL`,
    /// `SIGNALPIPE_FEED_URL`, `SIGNALPIPE_SOCIAL_SUBREDDIT`,
    /// `SIGNALPIPE_WEBHOOK_URL`, plus the `PipelineConfig` knobs.
    pub fn new(db_path: &str) -> Result<Self, PipelineError> {
        let api_key = std::env::var("SIGNALPIPE_OPENAI_API_KEY").unwrap_or_default();

        let provider =
            std::env::var("SIGNALPIPE_EMBEDDING_PROVIDER").unwrap_or_else(|_| "hashing".into());
        let embedding_model = std::env::var("SIGNALPIPE_EMBEDDING_MODEL").ok();
        let embedder: Arc<dyn EmbeddingProvider> = match provider.as_str() {
            "openai" => Arc::new(OpenAiEmbedder::new(api_key.clone(), embedding_model)),
            _ => Arc::new(HashingEmbedder),
        };

        if api_key.is_empty() {
            return Err(PipelineError::InvalidInput(
                "SIGNALPIPE_OPENAI_API_KEY is required for the reasoning backend".into(),
            ));
        }
        let reasoning_model = std::env::var("SIGNALPIPE_REASONING_MODEL").ok();
        let backend: Arc<dyn ReasoningBackend> = Arc::new(OpenAiBackend::new(api_key, reasoning_model));

        let mut sources: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(ScreenerSource::new())];
        if let Ok(feed_url) = std::env::var("SIGNALPIPE_FEED_URL") {
            sources.push(Arc::new(NewsFeedSource::new(feed_url)));
        }
        if let Ok(subreddit) = std::env::var("SIGNALPIPE_SOCIAL_SUBREDDIT") {
            sources.push(Arc::new(SocialSource::new(subreddit)));
        }

        let notifier: Arc<dyn Notifier> = match std::env::var("SIGNALPIPE_WEBHOOK_URL") {
            Ok(url) => Arc::new(WebhookNotifier::new(url)),
            Err(_) => Arc::new(LogNotifier),
        };

        Self::with_providers(
            db_path,
            sources,
            embedder,
            backend,
            notifier,
            PipelineConfig::from_env(),
        )
    }

    pub fn with_providers(
        db_path: &str,
        sources: Vec<Arc<dyn SourceAdapter>>,
        embedder: Arc<dyn EmbeddingProvider>,
        backend: Arc<dyn ReasoningBackend>,
        notifier: Arc<dyn Notifier>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        // Each repo gets its own connection. A plain ":memory:" would give
        // every connection a private database, so route it through a named
        // shared-cache URI instead.
        let db_path = if db_path == ":memory:" {
            format!(
                "file:memdb_{}?mode=memory&cache=shared",
                uuid::Uuid::new_v4().simple()
            )
        } else {
            db_path.to_string()
        };

        let conn_obs = open(&db_path)?;
        run_migrations(&conn_obs).map_err(PipelineError::Database)?;
        let conn_dec = open(&db_path)?;
        let conn_run = open(&db_path)?;
        let conn_vec = open(&db_path)?;

        let observations: Arc<dyn ObservationRepository> =
            Arc::new(SqliteObservationRepo::new(conn_obs));
        let decisions: Arc<dyn DecisionRepository> = Arc::new(SqliteDecisionRepo::new(conn_dec));
        let runs: Arc<dyn RunRepository> = Arc::new(SqliteRunRepo::new(conn_run));
        let vector_store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(conn_vec));

        let provider_dim = embedder.dimension();
        if provider_dim > 0 {
            if let Ok(Some(stored_dim)) = vector_store.stored_dimension() {
                if stored_dim != provider_dim {
                    tracing::warn!(
                        stored_dim,
                        provider_dim,
                        "stored vectors do not match the embedding provider; run `reindex`"
                    );
                }
            }
        }

        let context_builder = Arc::new(ContextBuilder::new(
            vector_store.clone(),
            observations.clone(),
            config.top_k,
            config.min_score,
            config.context_char_budget,
        ));
        let engine = Arc::new(DecisionEngine::new(
            backend,
            decisions.clone(),
            config.clone(),
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            sources,
            embedder.clone(),
            vector_store.clone(),
            context_builder,
            engine,
            observations.clone(),
            runs.clone(),
            notifier,
            config,
        ));

        Ok(Self {
            orchestrator,
            observations,
            decisions,
            runs,
            vector_store,
            embedder,
        })
    }

    /// Execute one pipeline run over the given symbols.
    pub async fn run(&self, symbols: &[String]) -> Result<Run, PipelineError> {
        Arc::clone(&self.orchestrator).run(symbols).await
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.orchestrator.cancel_handle()
    }

    pub fn decisions(
        &self,
        symbol: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Decision>, PipelineError> {
        self.decisions.list(symbol, limit)
    }

    pub fn runs(&self, limit: usize) -> Result<Vec<Run>, PipelineError> {
        self.runs.list(limit)
    }

    pub fn stats(&self) -> Result<PipeStats, PipelineError> {
        Ok(PipeStats {
            total_observations: self.observations.count()?,
            total_decisions: self.decisions.count()?,
            total_runs: self.runs.count()?,
        })
    }

    /// Re-embed observations missing from the vector index (after an
    /// embedding-model change). Returns how many were indexed.
    pub async fn reindex(&self) -> Result<usize, PipelineError> {
        let missing = self.observations.missing_vectors()?;
        if missing.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = missing.iter().map(|o| o.embeddable_text()).collect();
        let vectors = self
            .embedder
            .embed(&texts, InputType::Document)
            .await
            .map_err(PipelineError::EmbeddingUnavailable)?;
        let model = self.embedder.fingerprint();
        let mut indexed = 0;
        for (obs, vector) in missing.iter().zip(vectors.iter()) {
            if vector.is_empty() {
                continue;
            }
            self.vector_store
                .upsert(&obs.id, vector, &model)
                .map_err(PipelineError::Database)?;
            indexed += 1;
        }
        Ok(indexed)
    }
}

fn open(db_path: &str) -> Result<Connection, PipelineError> {
    let flags = rusqlite::OpenFlags::default() | rusqlite::OpenFlags::SQLITE_OPEN_URI;
    let conn = Connection::open_with_flags(db_path, flags)
        .map_err(|e| PipelineError::Database(format!("DB error: {e}")))?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| PipelineError::Database(format!("WAL error: {e}")))?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(|e| PipelineError::Database(format!("DB error: {e}")))?;
    Ok(conn)
}
