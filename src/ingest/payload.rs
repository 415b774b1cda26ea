// src/ingest/payload.rs
//! Payload construction: raw wire records in, embedding text plus a
//! validated storage record out.
//!
//! Truncation limits are part of the storage contract: the text handed to
//! the embedder carries at most 500 chars of body, the stored `body` at
//! most 1000 chars, and the stored `embedding_text` copy at most 500.

use chrono::{DateTime, Timelike, Utc};
use serde_json::Value;

use crate::ingest::types::{
    lenient_u64, MarketSnapshot, RawSocialPost, RawTopicSummary, SocialPostRecord,
    TopicSummaryRecord,
};
use crate::sentiment::{dominant_sentiment, lenient_f64, normalize_post_sentiment};

pub const SOURCE_TAG: &str = "lunarcrush";

pub const EMBED_BODY_LIMIT: usize = 500;
pub const STORED_BODY_LIMIT: usize = 1000;
pub const STORED_EMBED_TEXT_LIMIT: usize = 500;

/// Pipe-joined context string handed to the embedder. Segments appear in a
/// fixed order and are dropped when their field is missing or empty.
pub fn post_embedding_text(post: &RawSocialPost, symbol: &str) -> String {
    let mut parts = vec![format!("Symbol: {symbol}")];

    if let Some(title) = post.title.as_deref().filter(|t| !t.is_empty()) {
        parts.push(format!("Title: {title}"));
    }
    if let Some(body) = post.body.as_deref().filter(|b| !b.is_empty()) {
        parts.push(format!("Content: {}", truncate_chars(body, EMBED_BODY_LIMIT)));
    }
    if let Some(s) = post.sentiment.as_ref().and_then(raw_display) {
        parts.push(format!("Sentiment: {s}"));
    }
    if let Some(pt) = post.post_type.as_deref().filter(|t| !t.is_empty()) {
        parts.push(format!("Type: {pt}"));
    }

    parts.join(" | ")
}

/// Build the embedding input and the storage record for one post.
/// `post_id` has already been validated by the caller (dedup key).
pub fn build_post_payload(
    post: &RawSocialPost,
    post_id: &str,
    symbol: &str,
    market: Option<&MarketSnapshot>,
    ingested_at: DateTime<Utc>,
) -> (String, SocialPostRecord) {
    let text = post_embedding_text(post, symbol);

    let (sentiment, defaulted) = normalize_post_sentiment(post.sentiment.as_ref());
    if defaulted && post.sentiment.is_some() {
        tracing::warn!(
            symbol,
            post_id,
            raw = ?post.sentiment,
            "unusable post sentiment, storing neutral"
        );
    }

    let record = SocialPostRecord {
        symbol: symbol.to_string(),
        post_id: post_id.to_string(),
        post_type: post
            .post_type
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        title: post.title.clone().unwrap_or_default(),
        body: truncate_chars(post.body.as_deref().unwrap_or(""), STORED_BODY_LIMIT),
        sentiment,
        interactions: post.interactions_count(),
        creator_name: post.creator_name.clone().unwrap_or_default(),
        post_created: post
            .created
            .clone()
            .unwrap_or_else(|| Value::String(String::new())),
        market_price: market.and_then(|m| m.price),
        market_cap: market.and_then(|m| m.market_cap),
        percent_change_24h: market.and_then(|m| m.percent_change_24h),
        ingested_at,
        source: SOURCE_TAG.to_string(),
        embedding_text: truncate_chars(&text, STORED_EMBED_TEXT_LIMIT),
    };

    (text, record)
}

/// Human-readable rollup line for the topic snapshot; also what gets embedded.
pub fn topic_summary_text(summary: &RawTopicSummary, symbol: &str) -> String {
    let rank = summary
        .rank()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut parts = vec![
        format!("Symbol: {symbol}"),
        format!("Topic Rank: {rank}"),
        format!("24h Interactions: {}", counter(&summary.interactions_24h)),
        format!("Contributors: {}", counter(&summary.num_contributors)),
        format!("Posts: {}", counter(&summary.num_posts)),
    ];

    if !summary.types_sentiment.is_empty() {
        if let Ok(js) = serde_json::to_string(&summary.types_sentiment) {
            parts.push(format!("Sentiment by type: {js}"));
        }
    }

    parts.join(" | ")
}

/// Build the embedding input and the storage record for one hourly topic
/// snapshot.
pub fn build_topic_payload(
    summary: &RawTopicSummary,
    symbol: &str,
    market: Option<&MarketSnapshot>,
    ingested_at: DateTime<Utc>,
) -> (String, TopicSummaryRecord) {
    let text = topic_summary_text(summary, symbol);

    let record = TopicSummaryRecord {
        topic: symbol.to_lowercase(),
        symbol: symbol.to_string(),
        time_bucket: floor_to_hour(ingested_at),
        summary_type: "hourly_snapshot".to_string(),
        topic_rank: summary.rank(),
        interactions_24h: counter(&summary.interactions_24h),
        num_contributors: counter(&summary.num_contributors),
        num_posts: counter(&summary.num_posts),
        social_dominance: summary
            .social_dominance
            .as_ref()
            .and_then(lenient_f64)
            .unwrap_or(0.0),
        sentiment_breakdown: summary.types_sentiment.clone(),
        dominant_sentiment: dominant_sentiment(&summary.types_sentiment),
        market_price: market.and_then(|m| m.price),
        market_cap: market.and_then(|m| m.market_cap),
        ingested_at,
        summary_text: text.clone(),
    };

    (text, record)
}

/// Floor to the start of the hour; the topic collection holds one snapshot
/// per symbol per hour bucket.
pub fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Character-based cap, mirroring the storage contract (chars, not bytes).
fn truncate_chars(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max).collect();
    }
    out
}

fn counter(v: &Option<Value>) -> u64 {
    v.as_ref().and_then(lenient_u64).unwrap_or(0)
}

/// Raw sentiment as it should appear in the embedding text: numbers as
/// written, strings without JSON quoting.
fn raw_display(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().expect("test timestamp")
    }

    fn post(v: serde_json::Value) -> RawSocialPost {
        serde_json::from_value(v).expect("test post")
    }

    #[test]
    fn embedding_text_keeps_segment_order() {
        let p = post(json!({
            "id": 7,
            "title": "Halving news",
            "body": "Miners are repositioning.",
            "sentiment": 4,
            "post_type": "tweet"
        }));
        assert_eq!(
            post_embedding_text(&p, "BTC"),
            "Symbol: BTC | Title: Halving news | Content: Miners are repositioning. | Sentiment: 4 | Type: tweet"
        );
    }

    #[test]
    fn missing_segments_are_dropped() {
        let p = post(json!({"id": 7}));
        assert_eq!(post_embedding_text(&p, "SOL"), "Symbol: SOL");
        let p = post(json!({"id": 7, "title": "", "body": "x"}));
        assert_eq!(post_embedding_text(&p, "SOL"), "Symbol: SOL | Content: x");
    }

    #[test]
    fn long_body_is_truncated_at_each_boundary() {
        let body: String = "x".repeat(1500);
        let p = post(json!({"id": 1, "body": body}));
        let (text, record) = build_post_payload(&p, "1", "ETH", None, utc("2026-08-21T10:15:00Z"));

        let content = text.split(" | ").nth(1).expect("content segment");
        assert_eq!(content.chars().count(), "Content: ".len() + EMBED_BODY_LIMIT);
        assert_eq!(record.body.chars().count(), STORED_BODY_LIMIT);
        assert_eq!(record.embedding_text.chars().count(), STORED_EMBED_TEXT_LIMIT);
        assert!(text.chars().count() > STORED_EMBED_TEXT_LIMIT);
    }

    #[test]
    fn post_record_defaults_and_market_context() {
        let p = post(json!({"id": 42, "sentiment": "oops"}));
        let market = MarketSnapshot {
            price: Some(64250.5),
            market_cap: Some(1.2e12),
            percent_change_24h: Some(-3.1),
        };
        let (_, record) =
            build_post_payload(&p, "42", "BTC", Some(&market), utc("2026-08-21T10:15:00Z"));
        assert_eq!(record.post_type, "unknown");
        assert_eq!(record.sentiment, 3.0);
        assert_eq!(record.interactions, 0);
        assert_eq!(record.market_price, Some(64250.5));
        assert_eq!(record.percent_change_24h, Some(-3.1));
        assert_eq!(record.source, "lunarcrush");
        assert_eq!(record.post_created, json!(""));

        let (_, record) = build_post_payload(&p, "42", "BTC", None, utc("2026-08-21T10:15:00Z"));
        assert_eq!(record.market_price, None);
        assert_eq!(record.market_cap, None);
    }

    #[test]
    fn topic_text_with_breakdown() {
        let t: RawTopicSummary = serde_json::from_value(json!({
            "topic_rank": 3,
            "interactions_24h": 120000,
            "num_contributors": 5400,
            "num_posts": 900,
            "types_sentiment": {"reddit-post": 70, "tweet": 90}
        }))
        .unwrap();
        assert_eq!(
            topic_summary_text(&t, "BTC"),
            "Symbol: BTC | Topic Rank: 3 | 24h Interactions: 120000 | Contributors: 5400 | Posts: 900 | Sentiment by type: {\"reddit-post\":70,\"tweet\":90}"
        );
    }

    #[test]
    fn topic_text_without_breakdown_or_rank() {
        let t = RawTopicSummary::default();
        assert_eq!(
            topic_summary_text(&t, "AVAX"),
            "Symbol: AVAX | Topic Rank: N/A | 24h Interactions: 0 | Contributors: 0 | Posts: 0"
        );
    }

    #[test]
    fn topic_record_buckets_to_the_hour() {
        let t: RawTopicSummary = serde_json::from_value(json!({
            "social_dominance": "2.85",
            "types_sentiment": {"tweet": 90, "reddit-post": 70}
        }))
        .unwrap();
        let (_, record) =
            build_topic_payload(&t, "ETH", None, utc("2026-08-21T10:47:31.123456Z"));
        assert_eq!(record.topic, "eth");
        assert_eq!(record.time_bucket, utc("2026-08-21T10:00:00Z"));
        assert_eq!(record.summary_type, "hourly_snapshot");
        assert_eq!(record.topic_rank, None);
        assert_eq!(record.social_dominance, 2.85);
        assert_eq!(record.dominant_sentiment, 5.0);
    }
}
