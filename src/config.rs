use anyhow::{bail, Context, Result};
use medallion_core::chunk::{ChunkIdPolicy, DEFAULT_CHUNK_WIDTH};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub allow_http: bool,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            bucket: None,
            endpoint_url: None,
            region: default_region(),
            allow_http: false,
            local_path: None,
        }
    }
}

fn default_storage_backend() -> String {
    "memory".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_chunk_width")]
    pub chunk_width: usize,
    #[serde(default)]
    pub chunk_ids: ChunkIdPolicy,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_width: default_chunk_width(),
            chunk_ids: ChunkIdPolicy::default(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_chunk_width() -> usize {
    DEFAULT_CHUNK_WIDTH
}
fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Total GET attempts per URL.
    #[serde(default = "default_fetch_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: Vec<u64>,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_fetch_retries(),
            backoff_secs: default_backoff_secs(),
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    pub fn backoff(&self) -> Vec<Duration> {
        self.backoff_secs
            .iter()
            .map(|&s| Duration::from_secs(s))
            .collect()
    }
}

fn default_fetch_retries() -> u32 {
    5
}
fn default_backoff_secs() -> Vec<u64> {
    vec![1, 2, 4, 8, 16]
}
fn default_fetch_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override for the HTTP providers.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            url: None,
            collection: default_collection(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_index_provider() -> String {
    "memory".to_string()
}
fn default_collection() -> String {
    "rag_docs".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default = "default_object_prefix")]
    pub object_prefix: String,
    /// Pause between page requests.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            object_prefix: default_object_prefix(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_object_prefix() -> String {
    "toscrape".to_string()
}
fn default_delay_ms() -> u64 {
    1000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    match config.storage.backend.as_str() {
        "memory" => {}
        "s3" => {
            if config.storage.bucket.as_deref().unwrap_or("").is_empty() {
                bail!("storage.bucket must be set when backend is 's3'");
            }
        }
        "local" => {
            if config.storage.local_path.is_none() {
                bail!("storage.local_path must be set when backend is 'local'");
            }
        }
        other => bail!(
            "Unknown storage backend: '{}'. Must be memory, s3, or local.",
            other
        ),
    }

    // Validate pipeline
    if config.pipeline.chunk_width == 0 {
        bail!("pipeline.chunk_width must be > 0");
    }
    if config.pipeline.concurrency == 0 {
        bail!("pipeline.concurrency must be >= 1");
    }

    // Validate fetch
    if config.fetch.max_retries == 0 {
        bail!("fetch.max_retries must be >= 1");
    }
    if config.fetch.backoff_secs.is_empty() {
        bail!("fetch.backoff_secs must not be empty");
    }

    // Validate embedding
    if config.embedding.is_enabled() && config.embedding.provider != "local" {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    match config.index.provider.as_str() {
        "memory" => {}
        "chroma" => {
            if config.index.url.is_none() {
                bail!("index.url must be set when provider is 'chroma'");
            }
        }
        other => bail!(
            "Unknown index provider: '{}'. Must be memory or chroma.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.pipeline.chunk_width, 512);
        assert_eq!(config.pipeline.chunk_ids, ChunkIdPolicy::Random);
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.fetch.backoff(), vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
            Duration::from_secs(16),
        ]);
        assert_eq!(config.index.collection, "rag_docs");
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
[storage]
backend = "s3"
bucket = "mydata"
endpoint_url = "http://localhost:9000"
allow_http = true

[pipeline]
chunk_width = 256
chunk_ids = "deterministic"
concurrency = 4

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 768

[index]
provider = "chroma"
url = "http://localhost:8000"
"#,
        )
        .unwrap();
        assert_eq!(config.storage.bucket.as_deref(), Some("mydata"));
        assert_eq!(config.pipeline.chunk_ids, ChunkIdPolicy::Deterministic);
        assert_eq!(config.pipeline.concurrency, 4);
        assert_eq!(config.embedding.dims, Some(768));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(parse("[pipeline]\nchunk_width = 0").is_err());
        assert!(parse("[pipeline]\nconcurrency = 0").is_err());
        assert!(parse("[fetch]\nmax_retries = 0").is_err());
        assert!(parse("[fetch]\nbackoff_secs = []").is_err());
        assert!(parse("[storage]\nbackend = \"s3\"").is_err());
        assert!(parse("[storage]\nbackend = \"local\"").is_err());
        assert!(parse("[storage]\nbackend = \"gcs\"").is_err());
        assert!(parse("[embedding]\nprovider = \"openai\"").is_err());
        assert!(parse("[index]\nprovider = \"chroma\"").is_err());
        assert!(parse("[pipeline]\nchunk_ids = \"sequential\"").is_err());
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config(Path::new("/nonexistent/medallion.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/medallion.toml"));
    }
}
