// tests/source_fetch.rs
// LunarCrush client against a local canned-response server: retry behavior,
// envelope decoding, truncation, and degrade-to-absent on exhaustion.

use std::sync::{Arc, Mutex};

use marketdb_ingestor::config::SourceConfig;
use marketdb_ingestor::ingest::source::LunarCrushClient;
use marketdb_ingestor::ingest::types::SignalSource;
use marketdb_ingestor::retry::RetryPolicy;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves the queued responses in order, one connection each, recording the
/// raw request text. Replies regardless of method or path.
async fn canned_server(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    tokio::spawn(async move {
        for (status, body) in responses {
            let Ok((mut sock, _)) = listener.accept().await else {
                return;
            };
            let mut buf = vec![0u8; 4096];
            let n = sock.read(&mut buf).await.unwrap_or(0);
            seen.lock()
                .expect("requests lock")
                .push(String::from_utf8_lossy(&buf[..n]).to_string());

            let reason = match status {
                200 => "OK",
                500 => "Internal Server Error",
                _ => "Error",
            };
            let resp = format!(
                "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = sock.write_all(resp.as_bytes()).await;
            let _ = sock.shutdown().await;
        }
    });

    (format!("http://{addr}"), requests)
}

fn source_config(base_url: String, max_posts: usize) -> SourceConfig {
    SourceConfig {
        base_url,
        api_key: "test-key".into(),
        timeout_secs: 2,
        max_posts_per_symbol: max_posts,
    }
}

#[tokio::test]
async fn market_fetch_retries_until_success() {
    let market = json!({
        "data": {"price": "64250.5", "market_cap": 1.27e12, "percent_change_24h": -2.1}
    });
    let (base_url, requests) = canned_server(vec![
        (500, "{}".into()),
        (500, "{}".into()),
        (200, market.to_string()),
    ])
    .await;
    let client = LunarCrushClient::with_retry(
        &source_config(base_url, 100),
        RetryPolicy::immediate(3),
    );

    let snapshot = client.fetch_market("BTC").await.expect("third attempt");
    assert_eq!(snapshot.price, Some(64250.5));
    assert_eq!(snapshot.percent_change_24h, Some(-2.1));

    let requests = requests.lock().expect("requests lock");
    assert_eq!(requests.len(), 3);
    assert!(requests[0].starts_with("GET /public/coins/BTC/v1 HTTP/1.1"));
    assert!(requests[0]
        .to_lowercase()
        .contains("authorization: bearer test-key"));
}

#[tokio::test]
async fn exhausted_retries_degrade_to_absent() {
    let (base_url, requests) =
        canned_server(vec![(500, "{}".into()), (500, "{}".into())]).await;
    let client = LunarCrushClient::with_retry(
        &source_config(base_url, 100),
        RetryPolicy::immediate(2),
    );

    assert!(client.fetch_market("BTC").await.is_none());
    assert_eq!(requests.lock().expect("requests lock").len(), 2);
}

#[tokio::test]
async fn posts_are_truncated_to_the_configured_cap() {
    let posts: Vec<serde_json::Value> = (1..=7)
        .map(|i| json!({"id": i, "title": format!("post {i}")}))
        .collect();
    let (base_url, requests) =
        canned_server(vec![(200, json!({"data": posts}).to_string())]).await;
    let client = LunarCrushClient::with_retry(
        &source_config(base_url, 5),
        RetryPolicy::immediate(1),
    );

    let fetched = client.fetch_posts("BTC").await;
    assert_eq!(fetched.len(), 5);
    // Freshest-first order preserved, tail dropped.
    assert_eq!(fetched[0].post_id().as_deref(), Some("1"));
    assert_eq!(fetched[4].post_id().as_deref(), Some("5"));

    let requests = requests.lock().expect("requests lock");
    assert!(requests[0].starts_with("GET /public/topic/btc/posts/v1 HTTP/1.1"));
}

#[tokio::test]
async fn missing_data_key_reads_as_failure() {
    let (base_url, _requests) = canned_server(vec![
        (200, r#"{"unexpected": true}"#.into()),
        (200, r#"{"unexpected": true}"#.into()),
    ])
    .await;
    let client = LunarCrushClient::with_retry(
        &source_config(base_url, 100),
        RetryPolicy::immediate(2),
    );

    assert!(client.fetch_market("BTC").await.is_none());
}

#[tokio::test]
async fn topic_fetch_parses_envelope() {
    let topic = json!({
        "data": {
            "topic_rank": 12,
            "interactions_24h": 50000,
            "num_contributors": 900,
            "num_posts": 4100,
            "types_sentiment": {"tweet": 90, "reddit-post": 70}
        }
    });
    let (base_url, requests) = canned_server(vec![(200, topic.to_string())]).await;
    let client = LunarCrushClient::with_retry(
        &source_config(base_url, 100),
        RetryPolicy::immediate(1),
    );

    let summary = client.fetch_topic("SOL").await.expect("topic");
    assert_eq!(summary.rank(), Some(12));
    assert_eq!(summary.types_sentiment.len(), 2);

    let requests = requests.lock().expect("requests lock");
    assert!(requests[0].starts_with("GET /public/topic/sol/v1 HTTP/1.1"));
}

#[tokio::test]
async fn empty_topic_object_reads_as_absent() {
    let (base_url, requests) =
        canned_server(vec![(200, json!({"data": {}}).to_string())]).await;
    let client = LunarCrushClient::with_retry(
        &source_config(base_url, 100),
        RetryPolicy::immediate(2),
    );

    assert!(client.fetch_topic("BTC").await.is_none());
    // A successful-but-empty response is absence, not a retryable failure.
    assert_eq!(requests.lock().expect("requests lock").len(), 1);
}
