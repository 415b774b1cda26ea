// src/store/mod.rs
//! Vector store abstraction.
//!
//! The pipeline reaches the store only through [`VectorStore`]:
//! batched upsert, filtered similarity search, and collection stats.
//! `QdrantGateway` speaks the REST API; `InMemoryStore` backs tests with
//! brute-force cosine search over the same contract.

pub mod memory;
pub mod qdrant;

pub use memory::InMemoryStore;
pub use qdrant::QdrantGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),

    #[error("store error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// One vector plus its JSON payload, addressed by a uuid string. The serde
/// shape doubles as the wire shape for upserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// Conjunction of payload predicates. Serializes to the store's native
/// `{"must": [...]}` filter clause.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    pub must: Vec<FieldCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCondition {
    pub key: String,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_value: Option<MatchValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchValue {
    pub value: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact payload equality on `key`.
    pub fn match_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.must.push(FieldCondition {
            key: key.to_string(),
            match_value: Some(MatchValue {
                value: value.into(),
            }),
            range: None,
        });
        self
    }

    /// Numeric range on `key`; either bound may be open.
    pub fn range(mut self, key: &str, gte: Option<f64>, lte: Option<f64>) -> Self {
        self.must.push(FieldCondition {
            key: key.to_string(),
            match_value: None,
            range: Some(RangeCondition { gte, lte }),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }

    /// Local payload predicate, used by the in-memory implementation.
    pub fn matches(&self, payload: &Value) -> bool {
        self.must.iter().all(|c| c.matches(payload))
    }
}

impl FieldCondition {
    fn matches(&self, payload: &Value) -> bool {
        let field = payload.get(&self.key);
        if let Some(m) = &self.match_value {
            if field != Some(&m.value) {
                return false;
            }
        }
        if let Some(r) = &self.range {
            let Some(x) = field.and_then(Value::as_f64) else {
                return false;
            };
            if r.gte.is_some_and(|min| x < min) {
                return false;
            }
            if r.lte.is_some_and(|max| x > max) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: Value,
    pub score: f32,
    pub payload: Value,
}

/// Collection introspection, reported in the end-of-cycle stats block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub vectors_count: Option<u64>,
    pub points_count: Option<u64>,
    pub status: String,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Batched write. With `wait` the store acks only once the write is
    /// durable; the pipeline always passes `true`.
    async fn upsert(
        &self,
        collection: &str,
        points: Vec<PointRecord>,
        wait: bool,
    ) -> StoreResult<()>;

    /// Top-`limit` nearest points, optionally constrained by `filter`.
    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<SearchFilter>,
    ) -> StoreResult<Vec<ScoredPoint>>;

    async fn collection_stats(&self, collection: &str) -> StoreResult<CollectionStats>;
}
