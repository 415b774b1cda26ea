// src/store/qdrant.rs
//! Qdrant REST gateway.
//!
//! Three endpoints cover the whole contract:
//!   PUT  /collections/{c}/points?wait=<bool>   — batched upsert
//!   POST /collections/{c}/points/search        — filtered similarity search
//!   GET  /collections/{c}                      — collection stats
//!
//! Responses arrive wrapped in `{"result": ..., "status": "ok"}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::StoreConfig;
use crate::store::{
    CollectionStats, PointRecord, ScoredPoint, SearchFilter, StoreError, StoreResult, VectorStore,
};

pub struct QdrantGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct WireScoredPoint {
    #[serde(default)]
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Deserialize)]
struct WireCollectionInfo {
    status: String,
    #[serde(default)]
    vectors_count: Option<u64>,
    #[serde(default)]
    points_count: Option<u64>,
}

impl QdrantGateway {
    pub fn new(cfg: &StoreConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("marketdb-ingestor/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: cfg.url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        }
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key);
        }
        req
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> StoreResult<T> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let envelope: Envelope<T> = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(envelope.result)
    }
}

#[async_trait]
impl VectorStore for QdrantGateway {
    async fn upsert(
        &self,
        collection: &str,
        points: Vec<PointRecord>,
        wait: bool,
    ) -> StoreResult<()> {
        #[derive(serde::Serialize)]
        struct Req {
            points: Vec<PointRecord>,
        }

        let url = format!(
            "{}/collections/{}/points?wait={}",
            self.base_url, collection, wait
        );
        let count = points.len();
        let resp = self
            .request(reqwest::Method::PUT, url)
            .json(&Req { points })
            .send()
            .await?;
        // Result body is just an operation ack; decoding it validates status.
        let _: Value = Self::decode(resp).await?;
        tracing::debug!(collection, count, "upsert acknowledged");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<SearchFilter>,
    ) -> StoreResult<Vec<ScoredPoint>> {
        #[derive(serde::Serialize)]
        struct Req {
            vector: Vec<f32>,
            limit: usize,
            #[serde(skip_serializing_if = "Option::is_none")]
            filter: Option<SearchFilter>,
            with_payload: bool,
        }

        let url = format!("{}/collections/{}/points/search", self.base_url, collection);
        let resp = self
            .request(reqwest::Method::POST, url)
            .json(&Req {
                vector,
                limit,
                filter: filter.filter(|f| !f.is_empty()),
                with_payload: true,
            })
            .send()
            .await?;

        let hits: Vec<WireScoredPoint> = Self::decode(resp).await?;
        Ok(hits
            .into_iter()
            .map(|h| ScoredPoint {
                id: h.id,
                score: h.score,
                payload: h.payload.unwrap_or(Value::Null),
            })
            .collect())
    }

    async fn collection_stats(&self, collection: &str) -> StoreResult<CollectionStats> {
        let url = format!("{}/collections/{}", self.base_url, collection);
        let resp = self.request(reqwest::Method::GET, url).send().await?;
        let info: WireCollectionInfo = Self::decode(resp).await?;
        Ok(CollectionStats {
            vectors_count: info.vectors_count,
            points_count: info.points_count,
            status: info.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_envelope_decodes() {
        let body = json!({
            "result": [
                {"id": "0a9c2f66-4b1d-4efb-93a7-5b3ce02b6c2a", "score": 0.92, "payload": {"symbol": "BTC"}},
                {"id": 17, "score": 0.55}
            ],
            "status": "ok",
            "time": 0.00042
        });
        let env: Envelope<Vec<WireScoredPoint>> = serde_json::from_value(body).unwrap();
        assert_eq!(env.result.len(), 2);
        assert_eq!(env.result[0].payload, Some(json!({"symbol": "BTC"})));
        assert!(env.result[1].payload.is_none());
    }

    #[test]
    fn collection_info_tolerates_missing_counts() {
        let body = json!({
            "result": {"status": "green", "points_count": 1517},
            "status": "ok",
            "time": 0.0001
        });
        let env: Envelope<WireCollectionInfo> = serde_json::from_value(body).unwrap();
        assert_eq!(env.result.status, "green");
        assert_eq!(env.result.points_count, Some(1517));
        assert_eq!(env.result.vectors_count, None);
    }
}
