// src/ingest/mod.rs
//! Ingestion pipeline: fetch per-symbol signals, embed, persist.
//!
//! Symbols are processed in waves of `wave_size` concurrent tasks with a
//! fixed pause between waves, which keeps the pipeline inside the source
//! API rate limit. Per-symbol failures degrade (logged and counted); the
//! only fatal condition is an embedding dimension mismatch, which would
//! corrupt the collections and therefore aborts the rest of the cycle.

pub mod payload;
pub mod source;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{IngestorConfig, PipelineConfig};
use crate::dedup::DedupCache;
use crate::embedding::EmbeddingProvider;
use crate::ingest::types::{MarketSnapshot, RawSocialPost, RawTopicSummary, SignalSource};
use crate::stats::{CycleSummary, StatsCollector};
use crate::store::{PointRecord, VectorStore};

/// One-time metrics registration (so series show up with help texts).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_posts_total", "Posts returned by the source API.");
        describe_counter!("ingest_posts_stored_total", "Post points written to the store.");
        describe_counter!(
            "ingest_topics_stored_total",
            "Topic snapshots written to the store."
        );
        describe_counter!("ingest_dedup_total", "Posts skipped by the seen-id cache.");
        describe_counter!(
            "ingest_fetch_errors_total",
            "Source fetches that degraded to an absent result."
        );
        describe_counter!("ingest_embed_errors_total", "Failed embedding requests.");
        describe_counter!("ingest_store_errors_total", "Vector store write failures.");
        describe_counter!(
            "ingest_symbols_failed_total",
            "Symbol tasks that panicked or hit the cycle deadline."
        );
        describe_counter!("ingest_cycles_total", "Completed ingestion cycles.");
        describe_histogram!("ingest_embed_ms", "Embedding request time in milliseconds.");
        describe_gauge!(
            "ingest_cycle_last_run_ts",
            "Unix ts when the last ingestion cycle finished."
        );
    });
}

#[derive(Debug, Error)]
pub enum IngestError {
    /// The embedder returned a vector whose length does not match the
    /// configured collection dimension. Writing it would poison search
    /// results, so the cycle aborts instead.
    #[error("embedding dimension mismatch: got {got}, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },
}

/// Drives one ingestion cycle over a symbol list. Cheap to clone; every
/// clone shares the same dedup cache and backing clients.
#[derive(Clone)]
pub struct Ingestor {
    source: Arc<dyn SignalSource>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    dedup: Arc<DedupCache>,
    pipeline: PipelineConfig,
    collection_posts: String,
    collection_topics: String,
}

impl Ingestor {
    pub fn new(
        source: Arc<dyn SignalSource>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        dedup: Arc<DedupCache>,
        cfg: &IngestorConfig,
    ) -> Self {
        Self {
            source,
            embedder,
            store,
            dedup,
            pipeline: cfg.pipeline.clone(),
            collection_posts: cfg.store.collection_posts.clone(),
            collection_topics: cfg.store.collection_topics.clone(),
        }
    }

    /// Run one full cycle over `symbols`. Returns the cycle summary, or the
    /// first fatal error (currently only [`IngestError::DimensionMismatch`]).
    pub async fn run_cycle(&self, symbols: &[String]) -> Result<CycleSummary> {
        ensure_metrics_described();

        let start = Instant::now();
        let deadline = start + self.pipeline.cycle_budget;
        let stats = Arc::new(StatsCollector::new());

        // chunks() panics on zero.
        let wave_size = self.pipeline.wave_size.max(1);
        tracing::info!(
            symbols = symbols.len(),
            wave_size,
            waves = symbols.len().div_ceil(wave_size),
            budget_secs = self.pipeline.cycle_budget.as_secs(),
            source = self.source.name(),
            "starting ingestion cycle"
        );

        let mut waves_run = 0usize;
        for (i, wave) in symbols.chunks(wave_size).enumerate() {
            let mut remaining = deadline.saturating_duration_since(Instant::now());
            if i > 0 && !remaining.is_zero() {
                // Pauza mezi vlnami kvuli rate limitu.
                tokio::time::sleep(self.pipeline.wave_delay).await;
                remaining = deadline.saturating_duration_since(Instant::now());
            }
            if remaining.is_zero() {
                let left = symbols.len() - i * wave_size;
                tracing::warn!(
                    skipped = left,
                    budget_secs = self.pipeline.cycle_budget.as_secs(),
                    "cycle budget exhausted, skipping remaining symbols"
                );
                stats.add_symbols_skipped(left as u64);
                break;
            }
            waves_run += 1;

            let mut handles = Vec::with_capacity(wave.len());
            for symbol in wave {
                let ing = self.clone();
                let symbol = symbol.clone();
                let stats = Arc::clone(&stats);
                handles.push(tokio::spawn(async move {
                    match tokio::time::timeout(remaining, ing.ingest_symbol(&symbol, &stats)).await
                    {
                        Ok(res) => res,
                        Err(_) => {
                            tracing::warn!(symbol = %symbol, "symbol task hit the cycle deadline");
                            stats.add_symbol_failed();
                            counter!("ingest_symbols_failed_total").increment(1);
                            Ok(())
                        }
                    }
                }));
            }

            let mut fatal: Option<anyhow::Error> = None;
            for handle in handles {
                match handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => fatal = Some(e),
                    Err(e) => {
                        tracing::error!(error = ?e, "symbol task panicked");
                        stats.add_symbol_failed();
                        counter!("ingest_symbols_failed_total").increment(1);
                    }
                }
            }
            if let Some(e) = fatal {
                return Err(e.context("aborting ingestion cycle"));
            }
        }

        counter!("ingest_cycles_total").increment(1);
        gauge!("ingest_cycle_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

        let summary = stats.summary(symbols.len(), waves_run, start.elapsed());
        tracing::info!(
            posts_stored = summary.posts_stored,
            topics_stored = summary.topics_stored,
            deduped = summary.posts_deduped,
            fetch_failures = summary.fetch_failures,
            store_errors = summary.store_errors,
            elapsed_secs = summary.elapsed_secs,
            "ingestion cycle complete"
        );
        Ok(summary)
    }

    async fn ingest_symbol(&self, symbol: &str, stats: &StatsCollector) -> Result<()> {
        tracing::info!(symbol, "ingesting symbol");

        let (market, posts, topic) = tokio::join!(
            self.source.fetch_market(symbol),
            self.source.fetch_posts(symbol),
            self.source.fetch_topic(symbol),
        );
        if market.is_none() {
            stats.add_fetch_failure();
        }
        if topic.is_none() {
            stats.add_fetch_failure();
        }
        counter!("ingest_posts_total").increment(posts.len() as u64);

        if !posts.is_empty() {
            self.process_posts(symbol, &posts, market.as_ref(), stats)
                .await?;
        }
        if let Some(summary) = topic {
            self.process_topic(symbol, &summary, market.as_ref(), stats)
                .await?;
        }

        tracing::debug!(symbol, "symbol done");
        Ok(())
    }

    /// Dedup, embed and store one symbol's posts. Embedding and store
    /// failures are absorbed here; only a dimension mismatch propagates.
    async fn process_posts(
        &self,
        symbol: &str,
        posts: &[RawSocialPost],
        market: Option<&MarketSnapshot>,
        stats: &StatsCollector,
    ) -> Result<()> {
        let now = chrono::Utc::now();
        let mut texts = Vec::new();
        let mut records = Vec::new();
        let mut deduped = 0u64;

        for post in posts {
            let Some(post_id) = post.post_id() else {
                tracing::warn!(symbol, "post without usable id, skipping");
                stats.add_post_without_id();
                continue;
            };
            // Claimed before the write: a post that later fails to store is
            // not retried next cycle. Better to drop one post than store twins.
            if !self.dedup.mark_seen(&post_id) {
                deduped += 1;
                continue;
            }
            let (text, record) = payload::build_post_payload(post, &post_id, symbol, market, now);
            texts.push(text);
            records.push(record);
        }

        if deduped > 0 {
            stats.add_posts_deduped(deduped);
            counter!("ingest_dedup_total").increment(deduped);
        }
        if texts.is_empty() {
            tracing::debug!(symbol, "no new posts");
            return Ok(());
        }

        let vectors = match self.embedder.embed(&texts).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = ?e, symbol, count = texts.len(), "post embedding failed");
                stats.add_embed_error();
                counter!("ingest_embed_errors_total").increment(1);
                return Ok(());
            }
        };
        if vectors.len() != records.len() {
            tracing::error!(
                symbol,
                got = vectors.len(),
                expected = records.len(),
                "embedder returned wrong vector count, dropping batch"
            );
            stats.add_embed_error();
            counter!("ingest_embed_errors_total").increment(1);
            return Ok(());
        }
        self.check_dimensions(&vectors)?;

        let mut points = Vec::with_capacity(records.len());
        for (record, vector) in records.into_iter().zip(vectors) {
            points.push(PointRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: serde_json::to_value(&record).context("serializing post payload")?,
            });
        }

        let count = points.len() as u64;
        match self.store.upsert(&self.collection_posts, points, true).await {
            Ok(()) => {
                stats.add_posts_stored(count);
                counter!("ingest_posts_stored_total").increment(count);
                tracing::info!(symbol, count, "stored post points");
            }
            Err(e) => {
                tracing::error!(error = %e, symbol, count, "failed to store posts");
                stats.add_store_error();
                counter!("ingest_store_errors_total").increment(1);
            }
        }
        Ok(())
    }

    async fn process_topic(
        &self,
        symbol: &str,
        summary: &RawTopicSummary,
        market: Option<&MarketSnapshot>,
        stats: &StatsCollector,
    ) -> Result<()> {
        if summary.is_empty() {
            tracing::debug!(symbol, "empty topic summary, nothing to store");
            return Ok(());
        }

        let now = chrono::Utc::now();
        let (text, record) = payload::build_topic_payload(summary, symbol, market, now);

        let texts = vec![text];
        let vectors = match self.embedder.embed(&texts).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = ?e, symbol, "topic embedding failed");
                stats.add_embed_error();
                counter!("ingest_embed_errors_total").increment(1);
                return Ok(());
            }
        };
        self.check_dimensions(&vectors)?;
        let Some(vector) = vectors.into_iter().next() else {
            tracing::error!(symbol, "embedder returned no vector for topic text");
            stats.add_embed_error();
            counter!("ingest_embed_errors_total").increment(1);
            return Ok(());
        };

        let point = PointRecord {
            id: Uuid::new_v4().to_string(),
            vector,
            payload: serde_json::to_value(&record).context("serializing topic payload")?,
        };
        match self
            .store
            .upsert(&self.collection_topics, vec![point], true)
            .await
        {
            Ok(()) => {
                stats.add_topic_stored();
                counter!("ingest_topics_stored_total").increment(1);
                tracing::info!(symbol, time_bucket = %record.time_bucket, "stored topic snapshot");
            }
            Err(e) => {
                tracing::error!(error = %e, symbol, "failed to store topic snapshot");
                stats.add_store_error();
                counter!("ingest_store_errors_total").increment(1);
            }
        }
        Ok(())
    }

    fn check_dimensions(&self, vectors: &[Vec<f32>]) -> Result<()> {
        let expected = self.embedder.dimension();
        for v in vectors {
            if v.len() != expected {
                return Err(IngestError::DimensionMismatch {
                    got: v.len(),
                    expected,
                }
                .into());
            }
        }
        Ok(())
    }
}
