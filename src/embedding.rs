// src/embedding.rs
//! Embedding provider seam + HTTP implementation.
//!
//! The pipeline only ever sees the trait: batches of strings in, one
//! fixed-dimension vector per string out, input order preserved. The HTTP
//! implementation talks to an OpenAI-compatible `/embeddings` endpoint
//! (the deployment runs a text-embeddings-inference sidecar serving
//! BAAI/bge-large-en-v1.5).

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::histogram;

use crate::config::EmbeddingConfig;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    /// Length every returned vector must have.
    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
}

pub struct HttpEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl HttpEmbedder {
    pub fn new(cfg: &EmbeddingConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("marketdb-ingestor/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            dimension: cfg.dimension,
            batch_size: cfg.batch_size.max(1),
        }
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(serde::Serialize)]
        struct Req<'a> {
            model: &'a str,
            input: &'a [String],
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            data: Vec<Item>,
        }
        #[derive(serde::Deserialize)]
        struct Item {
            index: usize,
            embedding: Vec<f32>,
        }

        let url = format!("{}/embeddings", self.base_url);
        let mut req = self.http.post(&url).json(&Req {
            model: &self.model,
            input: batch,
        });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.context("embedding request")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("embedding service returned {status}: {body}");
        }

        let body: Resp = resp.json().await.context("embedding response decode")?;
        if body.data.len() != batch.len() {
            bail!(
                "embedding service returned {} vectors for {} inputs",
                body.data.len(),
                batch.len()
            );
        }

        restore_order(
            batch.len(),
            body.data.into_iter().map(|i| (i.index, i.embedding)).collect(),
        )
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let t0 = Instant::now();
            let mut vecs = self.embed_batch(batch).await?;
            histogram!("ingest_embed_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
            out.append(&mut vecs);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Services may return batch items out of order; the `index` field is
/// authoritative. Every slot must be filled exactly once.
fn restore_order(n: usize, items: Vec<(usize, Vec<f32>)>) -> Result<Vec<Vec<f32>>> {
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; n];
    for (index, embedding) in items {
        match slots.get_mut(index) {
            Some(slot) => *slot = Some(embedding),
            None => bail!("embedding index {index} out of range for batch of {n}"),
        }
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.with_context(|| format!("missing embedding for input {i}")))
        .collect()
}
