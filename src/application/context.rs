use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::ports::observation_repository::ObservationRepository;
use crate::domain::ports::vector_store::VectorStore;

/// One retrieved historical item grounding a decision.
#[derive(Debug, Clone)]
pub struct ContextItem {
    pub observation_id: String,
    pub score: f64,
    pub text: String,
}

/// Bounded, ordered set of retrieved historical items. Ephemeral: built per
/// decision-engine invocation, never persisted, never shared.
#[derive(Debug, Clone, Default)]
pub struct ContextWindow {
    pub items: Vec<ContextItem>,
}

impl ContextWindow {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.observation_id.clone()).collect()
    }
}

/// Builds a context window from the vector index: top-K by similarity,
/// deduplicated, current-run items excluded, trimmed to a character budget
/// by dropping lowest-score items first.
pub struct ContextBuilder {
    vector_store: Arc<dyn VectorStore>,
    observations: Arc<dyn ObservationRepository>,
    top_k: usize,
    min_score: f64,
    char_budget: usize,
}

impl ContextBuilder {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        observations: Arc<dyn ObservationRepository>,
        top_k: usize,
        min_score: f64,
        char_budget: usize,
    ) -> Self {
        Self {
            vector_store,
            observations,
            top_k,
            min_score,
            char_budget,
        }
    }

    /// An empty window is a valid result; retrieval failures degrade to it
    /// rather than blocking the decision.
    pub fn build(&self, query_vector: &[f32], exclude: &HashSet<String>) -> ContextWindow {
        if query_vector.is_empty() {
            return ContextWindow::empty();
        }

        // Over-fetch so exclusions don't starve the window.
        let fetch_k = self.top_k + exclude.len();
        let hits = match self.vector_store.query(query_vector, fetch_k, self.min_score) {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "vector query failed, proceeding with empty context");
                return ContextWindow::empty();
            }
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut items = Vec::new();
        for (id, score) in hits {
            if items.len() >= self.top_k {
                break;
            }
            if exclude.contains(&id) || !seen.insert(id.clone()) {
                continue;
            }
            let text = match self.observations.get_by_id(&id) {
                Ok(Some(obs)) => obs.embeddable_text(),
                Ok(None) => continue, // vector without a row; skip
                Err(e) => {
                    tracing::warn!(error = %e, id, "failed to hydrate context item");
                    continue;
                }
            };
            items.push(ContextItem {
                observation_id: id,
                score,
                text,
            });
        }

        // Items arrive sorted by score descending; evict from the tail
        // until the window fits the budget.
        let mut total: usize = items.iter().map(|i| i.text.len()).sum();
        while total > self.char_budget {
            match items.pop() {
                Some(dropped) => total -= dropped.text.len(),
                None => break,
            }
        }

        ContextWindow { items }
    }
}
