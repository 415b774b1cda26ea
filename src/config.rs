// src/config.rs
//! Runtime configuration.
//!
//! Everything is read from the environment once at startup (the binary
//! loads `.env` first; tests set vars directly) and the resulting value is
//! passed explicitly into each component. Tracked symbols may also come
//! from a TOML/JSON file so deployments can swap the watchlist without
//! touching the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_SYMBOLS: &[&str] = &["BTC", "ETH", "SOL", "AVAX", "MATIC"];

pub const COLLECTION_POSTS: &str = "market_posts";
pub const COLLECTION_TOPICS: &str = "topic_summaries";

const ENV_SYMBOLS: &str = "INGEST_SYMBOLS";
const ENV_SYMBOLS_PATH: &str = "INGEST_SYMBOLS_PATH";

#[derive(Debug, Clone)]
pub struct IngestorConfig {
    pub source: SourceConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_posts_per_symbol: usize,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// OpenAI-compatible base, e.g. `http://embedder:8080/v1`.
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection_posts: String,
    pub collection_topics: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Symbols ingested concurrently per wave.
    pub wave_size: usize,
    /// Pause between waves (source API rate limiting).
    pub wave_delay: Duration,
    /// Whole-cycle deadline; symbols not started in time are skipped.
    pub cycle_budget: Duration,
    pub dedup_capacity: usize,
}

impl IngestorConfig {
    /// Read configuration from the environment. Fails fast on a missing
    /// source API key; everything else has a default.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LUNARCRUSH_API_KEY")
            .map_err(|_| anyhow!("Missing LUNARCRUSH_API_KEY env var"))?;

        let source = SourceConfig {
            base_url: env_or("LUNARCRUSH_BASE_URL", "https://lunarcrush.com/api4"),
            api_key,
            timeout_secs: env_parse("LUNARCRUSH_TIMEOUT_SECS", 30),
            max_posts_per_symbol: env_parse("MAX_POSTS_PER_SYMBOL", 100),
        };

        let embedding = EmbeddingConfig {
            base_url: env_or("EMBEDDING_URL", "http://localhost:8080/v1"),
            api_key: env_opt("EMBEDDING_API_KEY"),
            model: env_or("EMBEDDING_MODEL", "BAAI/bge-large-en-v1.5"),
            dimension: env_parse("EMBEDDING_DIMENSION", 1024),
            batch_size: env_parse::<usize>("EMBEDDING_BATCH_SIZE", 32).max(1),
            timeout_secs: env_parse("EMBEDDING_TIMEOUT_SECS", 60),
        };

        let store = StoreConfig {
            url: env_or("QDRANT_URL", "http://localhost:6333"),
            api_key: env_opt("QDRANT_API_KEY"),
            collection_posts: env_or("COLLECTION_POSTS", COLLECTION_POSTS),
            collection_topics: env_or("COLLECTION_TOPICS", COLLECTION_TOPICS),
            timeout_secs: env_parse("QDRANT_TIMEOUT_SECS", 30),
        };

        let pipeline = PipelineConfig {
            wave_size: env_parse::<usize>("INGEST_WAVE_SIZE", 3).max(1),
            wave_delay: Duration::from_millis(env_parse("INGEST_WAVE_DELAY_MS", 2_000)),
            cycle_budget: Duration::from_secs(env_parse("INGEST_CYCLE_BUDGET_SECS", 300)),
            dedup_capacity: env_parse("INGEST_DEDUP_CAPACITY", crate::dedup::DEFAULT_DEDUP_CAPACITY),
        };

        Ok(Self {
            source,
            embedding,
            store,
            pipeline,
            symbols: load_symbols()?,
        })
    }

    /// Log the effective configuration. Secrets stay out of the log line.
    pub fn log_redacted(&self) {
        tracing::info!(
            source_base = %self.source.base_url,
            store = %self.store.url,
            collections = ?[&self.store.collection_posts, &self.store.collection_topics],
            embed_model = %self.embedding.model,
            embed_dim = self.embedding.dimension,
            wave_size = self.pipeline.wave_size,
            wave_delay_ms = self.pipeline.wave_delay.as_millis() as u64,
            cycle_budget_secs = self.pipeline.cycle_budget.as_secs(),
            symbols = ?self.symbols,
            "ingestor configuration"
        );
    }
}

/// Symbols resolution order:
/// 1) $INGEST_SYMBOLS (comma-separated)
/// 2) $INGEST_SYMBOLS_PATH (TOML `symbols = [...]` or JSON array)
/// 3) config/symbols.toml, then config/symbols.json
/// 4) built-in defaults
pub fn load_symbols() -> Result<Vec<String>> {
    if let Ok(raw) = std::env::var(ENV_SYMBOLS) {
        let list = clean_list(raw.split(',').map(str::to_string).collect());
        if !list.is_empty() {
            return Ok(list);
        }
    }
    if let Ok(p) = std::env::var(ENV_SYMBOLS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_symbols_from(&pb);
        }
        return Err(anyhow!("INGEST_SYMBOLS_PATH points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/symbols.toml");
    if toml_p.exists() {
        return load_symbols_from(&toml_p);
    }
    let json_p = PathBuf::from("config/symbols.json");
    if json_p.exists() {
        return load_symbols_from(&json_p);
    }
    Ok(DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect())
}

/// Load symbols from an explicit path. Supports TOML or JSON.
pub fn load_symbols_from(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading symbols from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if ext == "toml" {
        if let Ok(v) = parse_toml(&content) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(&content) {
        return Ok(v);
    }
    if ext != "toml" {
        if let Ok(v) = parse_toml(&content) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported symbols format"))
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlSymbols {
        symbols: Vec<String>,
    }
    let v: TomlSymbols = toml::from_str(s)?;
    Ok(clean_list(v.symbols))
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim, uppercase, drop empties, dedup. Configured order is preserved
/// because it decides wave composition.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out = Vec::new();
    for it in items {
        let t = it.trim().to_ascii_uppercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
