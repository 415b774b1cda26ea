//! Ingestion service — binary entrypoint.
//! Runs one ingestion cycle over the configured symbols, prints the cycle
//! summary and collection stats, then exits. Scheduling is external: cron or
//! a systemd timer fires the binary once per hour.

use std::process::ExitCode;
use std::sync::Arc;

use marketdb_ingestor::config::IngestorConfig;
use marketdb_ingestor::dedup::DedupCache;
use marketdb_ingestor::embedding::HttpEmbedder;
use marketdb_ingestor::ingest::source::LunarCrushClient;
use marketdb_ingestor::ingest::Ingestor;
use marketdb_ingestor::stats::gather_ingestion_stats;
use marketdb_ingestor::store::QdrantGateway;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match IngestorConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = ?e, "configuration error");
            return ExitCode::from(2);
        }
    };
    cfg.log_redacted();

    let source = Arc::new(LunarCrushClient::new(&cfg.source));
    let embedder = Arc::new(HttpEmbedder::new(&cfg.embedding));
    let store = Arc::new(QdrantGateway::new(&cfg.store));
    let dedup = Arc::new(DedupCache::new(cfg.pipeline.dedup_capacity));

    let ingestor = Ingestor::new(
        source,
        embedder,
        store.clone(),
        Arc::clone(&dedup),
        &cfg,
    );

    let summary = match ingestor.run_cycle(&cfg.symbols).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = ?e, "ingestion cycle aborted");
            return ExitCode::FAILURE;
        }
    };
    println!("{summary}");

    let collections = [
        cfg.store.collection_posts.clone(),
        cfg.store.collection_topics.clone(),
    ];
    let stats = gather_ingestion_stats(store.as_ref(), &collections, dedup.len()).await;
    match serde_json::to_string_pretty(&stats) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => tracing::warn!(error = ?e, "could not render collection stats"),
    }

    ExitCode::SUCCESS
}
