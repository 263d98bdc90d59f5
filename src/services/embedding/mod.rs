//! Text embedding backends
//!
//! Each backend maps course descriptions to fixed-length dense vectors. The
//! recommender only relies on the `TextEmbedder` contract: one vector per input,
//! in input order, deterministic for identical text, and no failure on empty
//! descriptions (those may come back as all-zero vectors).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, EmbeddingBackend},
    db::Cache,
    error::AppResult,
};

pub mod cached;
pub mod hashing;
pub mod remote;

pub use cached::CachedEmbedder;
pub use hashing::HashingEmbedder;
pub use remote::RemoteEmbedder;

/// Dense content vector of one course description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn zeros(dimensions: usize) -> Self {
        Self(vec![0.0; dimensions])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    /// True when the vector carries no direction (all zeros or empty)
    pub fn is_degenerate(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

/// Trait for text embedding backends
#[async_trait::async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embeds every text, returning vectors in the same order
    async fn embed(&self, texts: &[String]) -> AppResult<Vec<Embedding>>;

    /// Model identifier, used for cache keys and snapshot metadata
    fn model_name(&self) -> &str;
}

/// Builds the embedder selected by configuration
///
/// The remote backend is probed before returning, so a model server that cannot
/// be reached fails startup with a configuration error.
pub async fn create_embedder(
    config: &Config,
    cache: Option<Cache>,
) -> AppResult<Arc<dyn TextEmbedder>> {
    let embedder: Arc<dyn TextEmbedder> = match config.embedding_backend {
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.embedding_dimensions)),
        EmbeddingBackend::Remote => {
            let api_url = config.embedding_api_url.clone().unwrap_or_default();
            let remote = RemoteEmbedder::connect(
                api_url,
                config.embedding_model.clone(),
                config.embedding_dimensions,
                config.embedding_batch_size,
            )
            .await?;
            Arc::new(remote)
        }
    };

    tracing::info!(
        backend = ?config.embedding_backend,
        model = embedder.model_name(),
        cached = cache.is_some(),
        "Text embedder ready"
    );

    Ok(match cache {
        Some(cache) => Arc::new(CachedEmbedder::new(
            embedder,
            cache,
            config.embedding_cache_ttl,
        )),
        None => embedder,
    })
}
