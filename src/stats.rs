// src/stats.rs
//! Cycle counters and the end-of-run stats block.
//!
//! `StatsCollector` is shared by every symbol task in a cycle (plain
//! atomics, no locking); `CycleSummary` is the frozen result printed when
//! the cycle ends. `IngestionStats` adds the store's own view per
//! collection.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::store::{CollectionStats, VectorStore};

#[derive(Debug, Default)]
pub struct StatsCollector {
    posts_stored: AtomicU64,
    topics_stored: AtomicU64,
    posts_deduped: AtomicU64,
    posts_without_id: AtomicU64,
    fetch_failures: AtomicU64,
    embed_errors: AtomicU64,
    store_errors: AtomicU64,
    symbols_failed: AtomicU64,
    symbols_skipped: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_posts_stored(&self, n: u64) {
        self.posts_stored.fetch_add(n, Ordering::Relaxed);
    }
    pub fn add_topic_stored(&self) {
        self.topics_stored.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_posts_deduped(&self, n: u64) {
        self.posts_deduped.fetch_add(n, Ordering::Relaxed);
    }
    pub fn add_post_without_id(&self) {
        self.posts_without_id.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_embed_error(&self) {
        self.embed_errors.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_symbol_failed(&self) {
        self.symbols_failed.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_symbols_skipped(&self, n: u64) {
        self.symbols_skipped.fetch_add(n, Ordering::Relaxed);
    }

    /// Freeze the counters into a summary for reporting.
    pub fn summary(&self, symbols: usize, waves: usize, elapsed: Duration) -> CycleSummary {
        CycleSummary {
            symbols,
            waves,
            posts_stored: self.posts_stored.load(Ordering::Relaxed),
            topics_stored: self.topics_stored.load(Ordering::Relaxed),
            posts_deduped: self.posts_deduped.load(Ordering::Relaxed),
            posts_without_id: self.posts_without_id.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            embed_errors: self.embed_errors.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            symbols_failed: self.symbols_failed.load(Ordering::Relaxed),
            symbols_skipped: self.symbols_skipped.load(Ordering::Relaxed),
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }
}

/// Outcome of one ingestion cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSummary {
    pub symbols: usize,
    pub waves: usize,
    pub posts_stored: u64,
    pub topics_stored: u64,
    pub posts_deduped: u64,
    pub posts_without_id: u64,
    pub fetch_failures: u64,
    pub embed_errors: u64,
    pub store_errors: u64,
    pub symbols_failed: u64,
    pub symbols_skipped: u64,
    pub elapsed_secs: f64,
}

impl std::fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Ingestion Cycle Complete ===")?;
        writeln!(f, "Symbols:         {} ({} waves)", self.symbols, self.waves)?;
        writeln!(f, "Posts stored:    {}", self.posts_stored)?;
        writeln!(f, "Topics stored:   {}", self.topics_stored)?;
        writeln!(f, "Posts deduped:   {}", self.posts_deduped)?;
        writeln!(f, "Posts w/o id:    {}", self.posts_without_id)?;
        writeln!(f, "Fetch failures:  {}", self.fetch_failures)?;
        writeln!(f, "Embed errors:    {}", self.embed_errors)?;
        writeln!(f, "Store errors:    {}", self.store_errors)?;
        writeln!(f, "Symbols failed:  {}", self.symbols_failed)?;
        writeln!(f, "Symbols skipped: {} (deadline)", self.symbols_skipped)?;
        writeln!(f, "Elapsed:         {:.1}s", self.elapsed_secs)?;
        Ok(())
    }
}

/// Per-collection view straight from the store, plus the process-lifetime
/// processed-post count.
#[derive(Debug, Serialize)]
pub struct IngestionStats {
    pub collections: BTreeMap<String, CollectionReport>,
    pub processed_posts: usize,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CollectionReport {
    Ready(CollectionStats),
    Failed { error: String },
}

/// Ask the store about each collection; a per-collection failure becomes a
/// report entry instead of failing the whole block.
pub async fn gather_ingestion_stats(
    store: &dyn VectorStore,
    collections: &[String],
    processed_posts: usize,
) -> IngestionStats {
    let mut out = BTreeMap::new();
    for name in collections {
        let report = match store.collection_stats(name).await {
            Ok(stats) => CollectionReport::Ready(stats),
            Err(e) => CollectionReport::Failed {
                error: e.to_string(),
            },
        };
        out.insert(name.clone(), report);
    }
    IngestionStats {
        collections: out,
        processed_posts,
    }
}
