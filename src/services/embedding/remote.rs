//! Sentence-embedding server backend
//!
//! Talks to an HTTP embedding server exposing `POST /embed` with a
//! `{"inputs": [...]}` body and a `[[f32, ...], ...]` response (the
//! text-embeddings-inference convention). The server hosts the pretrained
//! sentence model; this client only batches requests and checks the shape
//! of what comes back.

use reqwest::Client as HttpClient;
use serde::Serialize;
use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    services::embedding::{Embedding, TextEmbedder},
};

const PROBE_TEXT: &str = "course recommender readiness probe";

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

#[derive(Clone)]
pub struct RemoteEmbedder {
    http_client: HttpClient,
    api_url: String,
    model_name: String,
    dimensions: usize,
    batch_size: usize,
}

impl RemoteEmbedder {
    pub fn new(api_url: String, model_name: String, dimensions: usize, batch_size: usize) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            model_name,
            dimensions,
            batch_size: batch_size.max(1),
        }
    }

    /// Creates the client and verifies the model server answers
    ///
    /// Any failure here is a configuration error: the snapshot cannot be built
    /// without the model. The probe's vector length becomes the dimension of
    /// every vector this embedder returns, blank descriptions included.
    pub async fn connect(
        api_url: String,
        model_name: String,
        dimensions: usize,
        batch_size: usize,
    ) -> AppResult<Self> {
        let mut embedder = Self::new(api_url, model_name, dimensions, batch_size);

        let probe = embedder
            .call_api(&[PROBE_TEXT.to_string()])
            .await
            .map_err(|e| {
                AppError::Configuration(format!(
                    "Embedding model {} at {} is not available: {}",
                    embedder.model_name, embedder.api_url, e
                ))
            })?;

        let dimensions = probe.first().map(Vec::len).unwrap_or(0);
        if dimensions == 0 {
            return Err(AppError::Configuration(format!(
                "Embedding model {} returned an empty probe vector",
                embedder.model_name
            )));
        }
        if dimensions != embedder.dimensions {
            tracing::warn!(
                configured = embedder.dimensions,
                served = dimensions,
                "Embedding server dimension differs from configuration, using the served one"
            );
            embedder.dimensions = dimensions;
        }

        tracing::info!(
            api_url = %embedder.api_url,
            model = %embedder.model_name,
            dimensions,
            "Connected to embedding server"
        );

        Ok(embedder)
    }

    /// Sends one batch to the embedding server
    async fn call_api(&self, inputs: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}/embed", self.api_url);

        let response = self
            .http_client
            .post(&url)
            .json(&EmbedRequest { inputs })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %body,
                "Embedding server request failed"
            );
            return Err(AppError::Embedding(format!(
                "Embedding server returned status {}: {}",
                status, body
            )));
        }

        let vectors: Vec<Vec<f32>> = response.json().await?;

        if vectors.len() != inputs.len() {
            return Err(AppError::Embedding(format!(
                "Embedding server returned {} vectors for {} inputs",
                vectors.len(),
                inputs.len()
            )));
        }

        Ok(vectors)
    }
}

/// Places server vectors back at their input positions
///
/// `positions` lists the input index of each vector in `vectors`. Inputs that were
/// never sent (blank descriptions) become zero vectors of the model dimension.
fn assemble(
    dimensions: usize,
    total: usize,
    positions: &[usize],
    vectors: Vec<Vec<f32>>,
) -> AppResult<Vec<Embedding>> {
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(AppError::Embedding(format!(
            "Embedding server returned a {}-dimensional vector, expected {}",
            bad.len(),
            dimensions
        )));
    }

    let mut slots: Vec<Option<Embedding>> = vec![None; total];
    for (&position, vector) in positions.iter().zip(vectors) {
        slots[position] = Some(Embedding::new(vector));
    }

    Ok(slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Embedding::zeros(dimensions)))
        .collect())
}

#[async_trait::async_trait]
impl TextEmbedder for RemoteEmbedder {
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
        let (positions, inputs): (Vec<usize>, Vec<String>) = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| (i, text.clone()))
            .unzip();

        let mut vectors = Vec::with_capacity(inputs.len());
        for chunk in inputs.chunks(self.batch_size) {
            vectors.extend(self.call_api(chunk).await?);
        }

        tracing::debug!(
            embedded = vectors.len(),
            blank = texts.len() - positions.len(),
            "Embedded descriptions"
        );

        assemble(self.dimensions, texts.len(), &positions, vectors)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
