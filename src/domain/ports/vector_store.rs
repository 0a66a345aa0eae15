/// Similarity index over embedded observations.
///
/// `query` returns at most `k` ids ordered by descending score, all scores
/// >= `min_score`. Querying right after `upsert` of the same vector must
/// return that id first with score ~1.0.
pub trait VectorStore: Send + Sync {
    fn upsert(&self, observation_id: &str, vector: &[f32], model: &str) -> Result<(), String>;

    fn query(&self, vector: &[f32], k: usize, min_score: f64) -> Result<Vec<(String, f64)>, String>;

    fn has_vector(&self, observation_id: &str) -> Result<bool, String>;

    /// Dimension of stored vectors, if any exist. Used to warn on model swaps.
    fn stored_dimension(&self) -> Result<Option<usize>, String>;
}
