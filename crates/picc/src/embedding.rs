//! Chunk embeddings over an OpenAI-compatible `/v1/embeddings` endpoint.
//!
//! [`run_embed_pending`] walks chunks without a vector in batches of
//! `embedding.batch_size` and stores one vector per chunk. A failed batch
//! stops the run; chunks already stored stay stored.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use picc_core::store::Store;

use crate::config::{Config, EmbeddingConfig};

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dims(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dims: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let Some(api_key) = config.api_key.clone() else {
            bail!("{} is not set", config.api_key_env);
        };
        let Some(model) = config.model.clone() else {
            bail!("embedding.model is required");
        };
        let Some(dims) = config.dims else {
            bail!("embedding.dims is required");
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/embeddings", config.base_url.trim_end_matches('/')),
            api_key,
            model,
            dims,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), model = %self.model, "requesting embeddings");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .context("embedding request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("Embedding API error {}: {}", status.as_u16(), text);
        }

        let mut parsed: EmbeddingResponse =
            resp.json().await.context("embedding response was not JSON")?;
        if parsed.data.len() != texts.len() {
            bail!(
                "embedding API returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            );
        }
        parsed.data.sort_by_key(|d| d.index);

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dims) {
            bail!(
                "embedding dims mismatch: expected {}, got {}",
                self.dims,
                bad.len()
            );
        }
        Ok(vectors)
    }
}

/// Build the configured embedder, or `None` when `embedding.provider = "disabled"`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Option<Arc<dyn Embedder>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "openai" => Ok(Some(Arc::new(OpenAiEmbedder::new(config)?))),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

pub async fn embed_query(embedder: &dyn Embedder, query: &str) -> Result<Vec<f32>> {
    let mut vectors = embedder.embed(&[query.to_string()]).await?;
    vectors.pop().context("embedding API returned no vector")
}

/// Embed every chunk that has no vector yet. Returns the number embedded.
pub async fn embed_pending(store: &dyn Store, embedder: &dyn Embedder, batch_size: usize) -> Result<usize> {
    let batch_size = batch_size.max(1);
    let mut total = 0;

    loop {
        let pending = store.pending_chunks(batch_size).await?;
        if pending.is_empty() {
            break;
        }

        let texts: Vec<String> = pending.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;

        for (chunk, vector) in pending.iter().zip(&vectors) {
            store
                .upsert_chunk_vector(&chunk.chunk_id, &chunk.content_id, vector)
                .await?;
        }
        total += pending.len();
        debug!(batch = pending.len(), total, "embedded batch");

        if pending.len() < batch_size {
            break;
        }
    }

    Ok(total)
}

/// `picc embed pending`
pub async fn run_embed_pending(config: &Config, store: &dyn Store) -> Result<()> {
    let Some(embedder) = create_embedder(&config.embedding)? else {
        bail!("embedding.provider is disabled");
    };
    let n = embed_pending(store, embedder.as_ref(), config.embedding.batch_size).await?;
    info!(embedded = n, model = embedder.model_name(), "embedding run finished");
    println!("Embedded {} chunks with {}", n, embedder.model_name());
    Ok(())
}
