use sha2::{Digest, Sha256};

use crate::domain::ports::embedding::{EmbeddingProvider, InputType};

const DIMENSION: usize = 256;

/// Deterministic local embedder: tokens are hashed into a fixed number of
/// buckets and the result is L2-normalized. No network, no model weights —
/// identical text always maps to the identical unit vector, which is exactly
/// what the self-similarity contract and offline runs need. Quality is
/// bag-of-words; use a real provider for production retrieval.
pub struct HashingEmbedder;

impl HashingEmbedder {
    fn embed_one(text: &str) -> Vec<f32> {
        let mut buckets = vec![0f32; DIMENSION];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let idx = u16::from_le_bytes([digest[0], digest[1]]) as usize % DIMENSION;
            // Sign bit from the hash spreads tokens across both directions.
            let sign = if digest[2] & 1 == 0 { 1.0 } else { -1.0 };
            buckets[idx] += sign;
        }
        let norm: f32 = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut buckets {
                *v /= norm;
            }
        }
        buckets
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>, String> {
        Ok(texts.iter().map(|t| Self::embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn fingerprint(&self) -> String {
        format!("hashing:v1:{DIMENSION}")
    }
}
