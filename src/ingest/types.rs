// src/ingest/types.rs
//! Wire shapes and storage payloads.
//!
//! The source API is loose about field types (ids and counters arrive as
//! numbers or strings, sentiment sometimes as text), so the `Raw*` DTOs
//! keep flaky fields as `serde_json::Value` and coerce on access. The
//! `*Record` structs are the validated payloads persisted with each vector;
//! their field names are the schema downstream query services filter on.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sentiment::lenient_f64;

/// Market snapshot for one symbol. Every field optional: a failed market
/// fetch must not block post or topic ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub market_cap: Option<f64>,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub percent_change_24h: Option<f64>,
}

/// One social post as returned by the posts endpoint. Unknown fields are
/// ignored; known fields may be missing entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSocialPost {
    /// Number or string on the wire.
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub post_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    /// 0–5 scale; number or numeric string.
    #[serde(default)]
    pub sentiment: Option<Value>,
    #[serde(default)]
    pub interactions: Option<Value>,
    #[serde(default)]
    pub creator_name: Option<String>,
    /// Creation timestamp, passed through to storage as given.
    #[serde(default)]
    pub created: Option<Value>,
}

impl RawSocialPost {
    /// Stable dedup key: numbers are stringified, strings trimmed.
    /// Posts without a usable id are skipped upstream.
    pub fn post_id(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    pub fn interactions_count(&self) -> u64 {
        self.interactions.as_ref().and_then(lenient_u64).unwrap_or(0)
    }
}

/// Hourly topic rollup as returned by the topic endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTopicSummary {
    #[serde(default)]
    pub topic_rank: Option<Value>,
    #[serde(default)]
    pub interactions_24h: Option<Value>,
    #[serde(default)]
    pub num_contributors: Option<Value>,
    #[serde(default)]
    pub num_posts: Option<Value>,
    #[serde(default)]
    pub social_dominance: Option<Value>,
    /// Per-platform 0–100 scores, e.g. {"tweet": 72, "reddit-post": 64}.
    #[serde(default)]
    pub types_sentiment: BTreeMap<String, Value>,
}

impl RawTopicSummary {
    pub fn rank(&self) -> Option<i64> {
        self.topic_rank
            .as_ref()
            .and_then(lenient_f64)
            .map(|x| x as i64)
    }

    /// True for the bare `{}` the topic endpoint serves when a symbol has
    /// no rollup yet. Callers treat it as an absent result.
    pub fn is_empty(&self) -> bool {
        self.topic_rank.is_none()
            && self.interactions_24h.is_none()
            && self.num_contributors.is_none()
            && self.num_posts.is_none()
            && self.social_dominance.is_none()
            && self.types_sentiment.is_empty()
    }
}

/// Storage payload for one social post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPostRecord {
    pub symbol: String,
    pub post_id: String,
    pub post_type: String,
    pub title: String,
    /// Truncated to 1000 chars.
    pub body: String,
    /// Normalized into 1.0–5.0.
    pub sentiment: f64,
    pub interactions: u64,
    pub creator_name: String,
    pub post_created: Value,
    pub market_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub ingested_at: DateTime<Utc>,
    pub source: String,
    /// What was embedded, truncated to 500 chars for traceability.
    pub embedding_text: String,
}

/// Storage payload for one hourly topic snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSummaryRecord {
    pub topic: String,
    pub symbol: String,
    /// Cycle timestamp floored to the start of the hour.
    pub time_bucket: DateTime<Utc>,
    pub summary_type: String,
    pub topic_rank: Option<i64>,
    pub interactions_24h: u64,
    pub num_contributors: u64,
    pub num_posts: u64,
    pub social_dominance: f64,
    pub sentiment_breakdown: BTreeMap<String, Value>,
    pub dominant_sentiment: f64,
    pub market_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub ingested_at: DateTime<Utc>,
    pub summary_text: String,
}

/// Read side of the source API. One implementation speaks HTTP; tests plug
/// in canned data. Fetches degrade to absent instead of erroring so a dead
/// endpoint never takes down a whole cycle.
#[async_trait::async_trait]
pub trait SignalSource: Send + Sync {
    async fn fetch_market(&self, symbol: &str) -> Option<MarketSnapshot>;
    async fn fetch_posts(&self, symbol: &str) -> Vec<RawSocialPost>;
    async fn fetch_topic(&self, symbol: &str) -> Option<RawTopicSummary>;
    fn name(&self) -> &'static str;
}

pub fn lenient_u64(v: &Value) -> Option<u64> {
    lenient_f64(v).filter(|x| *x >= 0.0).map(|x| x as u64)
}

fn de_lenient_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(lenient_f64))
}
