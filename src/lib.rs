// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod config;
pub mod dedup;
pub mod embedding;
pub mod ingest;
pub mod retry;
pub mod sentiment;
pub mod stats;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::config::IngestorConfig;
pub use crate::dedup::DedupCache;
pub use crate::ingest::source::LunarCrushClient;
pub use crate::ingest::{IngestError, Ingestor};
pub use crate::retry::RetryPolicy;
pub use crate::stats::{gather_ingestion_stats, CycleSummary, IngestionStats};
pub use crate::store::{InMemoryStore, QdrantGateway, VectorStore};
