use std::sync::Arc;

use crate::{
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    services::embedding::{Embedding, TextEmbedder},
};

/// Redis-backed cache in front of another embedder
///
/// Vectors are keyed by model name and description digest, so a rebuild only
/// embeds descriptions that changed since they were last cached. The cache is
/// best-effort: a failed read counts as a miss.
pub struct CachedEmbedder {
    inner: Arc<dyn TextEmbedder>,
    cache: Cache,
    ttl: u64,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn TextEmbedder>, cache: Cache, ttl: u64) -> Self {
        Self { inner, cache, ttl }
    }

    fn key(&self, text: &str) -> CacheKey {
        CacheKey::embedding(self.inner.model_name(), text)
    }
}

/// Blank descriptions always go to the inner embedder, which owns their zero vector
fn is_lookup_candidate(text: &str) -> bool {
    !text.trim().is_empty()
}

/// Places cache hits at their input positions and lists the indices still to embed
///
/// `lookups` holds the input index of each entry in `cached`. Degenerate hits are
/// discarded so a stale zero vector can never shadow the model's answer.
fn place_hits(
    total: usize,
    lookups: &[usize],
    cached: Vec<Option<Embedding>>,
) -> (Vec<Option<Embedding>>, Vec<usize>) {
    let mut slots: Vec<Option<Embedding>> = vec![None; total];
    for (&i, hit) in lookups.iter().zip(cached) {
        slots[i] = hit.filter(|e| !e.is_degenerate());
    }

    let misses = slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_none())
        .map(|(i, _)| i)
        .collect();
    (slots, misses)
}

#[async_trait::async_trait]
impl TextEmbedder for CachedEmbedder {
    async fn embed(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
        let lookups: Vec<usize> = (0..texts.len())
            .filter(|&i| is_lookup_candidate(&texts[i]))
            .collect();
        let keys: Vec<CacheKey> = lookups.iter().map(|&i| self.key(&texts[i])).collect();

        let cached = match self.cache.get_many_from_cache::<Embedding>(&keys).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(error = %e, "Embedding cache read failed, embedding everything");
                vec![None; keys.len()]
            }
        };

        let (mut slots, misses) = place_hits(texts.len(), &lookups, cached);

        tracing::debug!(
            hits = texts.len() - misses.len(),
            misses = misses.len(),
            "Embedding cache lookup"
        );

        if !misses.is_empty() {
            let pending: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed(&pending).await?;

            for (&i, embedding) in misses.iter().zip(fresh) {
                if is_lookup_candidate(&texts[i]) && !embedding.is_degenerate() {
                    self.cache
                        .set_in_background(&self.key(&texts[i]), &embedding, self.ttl);
                }
                slots[i] = Some(embedding);
            }
        }

        // a short inner result leaves unfilled slots
        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| {
                    AppError::Embedding(
                        "Embedder returned fewer vectors than requested".to_string(),
                    )
                })
            })
            .collect()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
