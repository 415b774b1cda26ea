// src/ingest/source.rs
//! HTTP client for the social analytics API.
//!
//! Three GET endpoints per symbol, each wrapped in the shared retry policy.
//! When an endpoint exhausts its retries the fetch degrades to "absent"
//! (None / empty) so one dead endpoint never takes the whole cycle down.
//! A topic response carrying no data at all reads as absent too.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::de::DeserializeOwned;

use crate::config::SourceConfig;
use crate::ingest::types::{MarketSnapshot, RawSocialPost, RawTopicSummary, SignalSource};
use crate::retry::RetryPolicy;

pub struct LunarCrushClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
    max_posts: usize,
}

impl LunarCrushClient {
    pub fn new(cfg: &SourceConfig) -> Self {
        Self::with_retry(cfg, RetryPolicy::default())
    }

    /// Same client with a custom retry policy (tests use [`RetryPolicy::immediate`]).
    pub fn with_retry(cfg: &SourceConfig, retry: RetryPolicy) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("marketdb-ingestor/0.1 (+https://github.com/marketdb)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            retry,
            max_posts: cfg.max_posts_per_symbol,
        }
    }

    /// GET `path` and unwrap the top-level `data` envelope.
    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        #[derive(serde::Deserialize)]
        struct Envelope<T> {
            data: T,
        }

        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("source API returned {status} for {path}");
        }
        let envelope: Envelope<T> = resp
            .json()
            .await
            .with_context(|| format!("decoding {path} response"))?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl SignalSource for LunarCrushClient {
    async fn fetch_market(&self, symbol: &str) -> Option<MarketSnapshot> {
        let path = format!("/public/coins/{symbol}/v1");
        match self
            .retry
            .run("market", || self.get_data::<MarketSnapshot>(&path))
            .await
        {
            Ok(snapshot) => {
                tracing::debug!(symbol, "fetched market data");
                Some(snapshot)
            }
            Err(e) => {
                tracing::error!(error = ?e, symbol, "market fetch failed, continuing without it");
                counter!("ingest_fetch_errors_total").increment(1);
                None
            }
        }
    }

    async fn fetch_posts(&self, symbol: &str) -> Vec<RawSocialPost> {
        let topic = symbol.to_lowercase();
        let path = format!("/public/topic/{topic}/posts/v1");
        match self
            .retry
            .run("posts", || self.get_data::<Vec<RawSocialPost>>(&path))
            .await
        {
            Ok(mut posts) => {
                tracing::debug!(symbol, count = posts.len(), "fetched social posts");
                // Keep only the freshest slice; the feed is returned newest-first.
                posts.truncate(self.max_posts);
                posts
            }
            Err(e) => {
                tracing::error!(error = ?e, symbol, "posts fetch failed, continuing without them");
                counter!("ingest_fetch_errors_total").increment(1);
                Vec::new()
            }
        }
    }

    async fn fetch_topic(&self, symbol: &str) -> Option<RawTopicSummary> {
        let topic = symbol.to_lowercase();
        let path = format!("/public/topic/{topic}/v1");
        match self
            .retry
            .run("topic", || self.get_data::<RawTopicSummary>(&path))
            .await
        {
            Ok(summary) if summary.is_empty() => {
                tracing::warn!(symbol, "topic endpoint returned no data");
                counter!("ingest_fetch_errors_total").increment(1);
                None
            }
            Ok(summary) => {
                tracing::debug!(symbol, "fetched topic summary");
                Some(summary)
            }
            Err(e) => {
                tracing::error!(error = ?e, symbol, "topic fetch failed, continuing without it");
                counter!("ingest_fetch_errors_total").increment(1);
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "lunarcrush"
    }
}
