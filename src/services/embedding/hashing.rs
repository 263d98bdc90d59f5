use std::collections::HashMap;

use crate::{error::AppResult, services::embedding::{Embedding, TextEmbedder}};

const BIGRAM_WEIGHT: f32 = 0.5;

/// In-process embedder based on signed feature hashing
///
/// Lowercased word tokens and adjacent-word bigrams are hashed with FNV-1a into
/// `dimensions` buckets, weighted by term frequency and L2-normalized. Texts
/// that share vocabulary land close together. The output depends only on the
/// text, so repeated runs produce bit-identical vectors.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    model_name: String,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model_name: format!("feature-hashing-{}", dimensions),
        }
    }

    fn fnv1a(feature: &str) -> u64 {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in feature.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        h
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.chars().count() >= 2)
            .map(|s| s.to_lowercase())
            .collect()
    }

    /// Embeds a single description
    pub fn embed_text(&self, text: &str) -> Embedding {
        let tokens = Self::tokenize(text);
        if tokens.is_empty() || self.dimensions == 0 {
            return Embedding::zeros(self.dimensions);
        }

        let mut features: HashMap<String, f32> = HashMap::new();
        for token in &tokens {
            *features.entry(token.clone()).or_default() += 1.0;
        }
        for pair in tokens.windows(2) {
            *features.entry(format!("{} {}", pair[0], pair[1])).or_default() += BIGRAM_WEIGHT;
        }

        let mut values = vec![0.0f32; self.dimensions];
        for (feature, weight) in &features {
            let h = Self::fnv1a(feature);
            let bucket = (h % self.dimensions as u64) as usize;
            // top bit picks the sign so unrelated collisions tend to cancel
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            values[bucket] += sign * weight;
        }

        let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut values {
                *v /= norm;
            }
        } else {
            values.iter_mut().for_each(|v| *v = 0.0);
        }

        Embedding::new(values)
    }
}

#[async_trait::async_trait]
impl TextEmbedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
