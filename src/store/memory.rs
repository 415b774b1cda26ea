// src/store/memory.rs
//! In-memory [`VectorStore`] used by tests.
//!
//! Collections are plain vectors behind an `RwLock`; search is brute-force
//! cosine over everything in the collection. Good enough for the point
//! counts and filter semantics the integration tests assert on.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::store::{
    CollectionStats, PointRecord, ScoredPoint, SearchFilter, StoreResult, VectorStore,
};

#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<PointRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn point_count(&self, collection: &str) -> usize {
        let map = self.collections.read().expect("store lock poisoned");
        map.get(collection).map(Vec::len).unwrap_or(0)
    }

    /// Snapshot of a collection for assertions.
    pub fn points(&self, collection: &str) -> Vec<PointRecord> {
        let map = self.collections.read().expect("store lock poisoned");
        map.get(collection).cloned().unwrap_or_default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(
        &self,
        collection: &str,
        points: Vec<PointRecord>,
        _wait: bool,
    ) -> StoreResult<()> {
        let mut map = self.collections.write().expect("store lock poisoned");
        let coll = map.entry(collection.to_string()).or_default();
        for p in points {
            match coll.iter_mut().find(|existing| existing.id == p.id) {
                Some(existing) => *existing = p,
                None => coll.push(p),
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<SearchFilter>,
    ) -> StoreResult<Vec<ScoredPoint>> {
        let map = self.collections.read().expect("store lock poisoned");
        let mut hits: Vec<ScoredPoint> = map
            .get(collection)
            .map(|coll| {
                coll.iter()
                    .filter(|p| filter.as_ref().map_or(true, |f| f.matches(&p.payload)))
                    .map(|p| ScoredPoint {
                        id: serde_json::Value::String(p.id.clone()),
                        score: cosine(&vector, &p.vector),
                        payload: p.payload.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn collection_stats(&self, collection: &str) -> StoreResult<CollectionStats> {
        let n = self.point_count(collection) as u64;
        Ok(CollectionStats {
            vectors_count: Some(n),
            points_count: Some(n),
            status: "green".to_string(),
        })
    }
}
