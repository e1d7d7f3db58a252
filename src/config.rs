//! Configuration for the corpus index.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.corpus-index/settings.toml`)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the binary after loading)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CORPUS_` and use double
//! underscores to separate nested levels:
//! - `CORPUS_DATABASE__URL=sqlite://data/corpus.db` sets `database.url`
//! - `CORPUS_KEYS__REVIEW_THRESHOLD=700000` sets `keys.review_threshold`
//! - `CORPUS_QUERY__DEFAULT_TOP_K=10` sets `query.default_top_k`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CorpusError, CorpusResult};
use crate::types::{DEFAULT_REVIEW_THRESHOLD, KeyPartition, VECTOR_DIMENSION_384, VectorDimension};

/// Directory holding the settings file, searched for from the current dir upward.
pub const CONFIG_DIR: &str = ".corpus-index";

const ENV_PREFIX: &str = "CORPUS_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path of the persisted index artifact
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Relational store holding both corpora
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Shared key space settings
    #[serde(default)]
    pub keys: KeyConfig,

    /// Build pipeline settings
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Query defaults
    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite://.corpus-index/corpus.db`
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct EmbeddingConfig {
    /// Model name, e.g. `all-MiniLM-L6-v2`
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Output dimension of the model; the index is created with this width
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Texts per call into the model
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Model download cache; defaults to the platform cache dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_false")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct KeyConfig {
    /// Index keys at or above this value are reviews, below it medical records
    #[serde(default = "default_review_threshold")]
    pub review_threshold: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct IndexingConfig {
    /// Rows fetched per store page; each page is one index batch
    #[serde(default = "default_indexing_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from("vector_store/corpus.idx")
}
fn default_database_url() -> String {
    format!("sqlite://{CONFIG_DIR}/corpus.db")
}
fn default_max_connections() -> u32 {
    5
}
fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}
fn default_dimension() -> usize {
    VECTOR_DIMENSION_384
}
fn default_embedding_batch_size() -> usize {
    64
}
fn default_false() -> bool {
    false
}
fn default_review_threshold() -> i64 {
    DEFAULT_REVIEW_THRESHOLD
}
fn default_indexing_batch_size() -> usize {
    100
}
fn default_top_k() -> usize {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            database: DatabaseConfig::default(),
            embedding: EmbeddingConfig::default(),
            keys: KeyConfig::default(),
            indexing: IndexingConfig::default(),
            query: QueryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_dimension(),
            batch_size: default_embedding_batch_size(),
            cache_dir: None,
            show_download_progress: default_false(),
        }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            review_threshold: default_review_threshold(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_indexing_batch_size(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl EmbeddingConfig {
    /// Directory fastembed downloads models into.
    pub fn model_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .map(|dir| dir.join("corpus-index").join("models"))
                .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("models"))
        })
    }
}

fn env_provider() -> Env {
    // Double underscore separates nesting; single underscores stay in field names
    Env::prefixed(ENV_PREFIX).map(|key| key.as_str().to_lowercase().replace("__", ".").into())
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(env_provider())
            .extract()
            .map_err(Box::new)
    }

    /// Find `.corpus-index/settings.toml` from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join("settings.toml"))
    }

    /// Rejects values that would make the index or queries unusable.
    pub fn validate(&self) -> CorpusResult<()> {
        let invalid = |reason: &str| {
            Err(CorpusError::Configuration {
                reason: reason.to_string(),
            })
        };

        if self.embedding.dimension == 0 {
            return invalid("embedding.dimension must be greater than zero");
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batch_size must be greater than zero");
        }
        if self.indexing.batch_size == 0 {
            return invalid("indexing.batch_size must be greater than zero");
        }
        if self.query.default_top_k == 0 {
            return invalid("query.default_top_k must be greater than zero");
        }
        if self.keys.review_threshold <= 0 {
            return invalid("keys.review_threshold must be greater than zero");
        }
        if self.database.max_connections == 0 {
            return invalid("database.max_connections must be greater than zero");
        }
        Ok(())
    }

    /// The configured index width.
    pub fn dimension(&self) -> CorpusResult<VectorDimension> {
        Ok(VectorDimension::new(self.embedding.dimension)?)
    }

    /// The configured split of the key space.
    pub fn partition(&self) -> CorpusResult<KeyPartition> {
        Ok(KeyPartition::new(self.keys.review_threshold)?)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create `.corpus-index/settings.toml` in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Self::init_config_file_at(PathBuf::from(CONFIG_DIR).join("settings.toml"), force)
    }

    /// Write a commented settings template to `config_path`
    pub fn init_config_file_at(
        config_path: PathBuf,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let defaults = Settings::default();
        let template = format!(
            r#"# corpus-index configuration

# Version of the configuration schema
version = {version}

# Persisted index artifact, written atomically by `corpus-index build`
index_path = "{index_path}"

[database]
# sqlx connection URL for the store holding customer_reviews and medical_records
url = "{url}"
max_connections = {max_connections}

[embedding]
# all-MiniLM-L6-v2, all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5, multilingual-e5-small
model = "{model}"

# Must match the model's output size
dimension = {dimension}

# Texts per call into the model
batch_size = {embedding_batch}

# Model download cache (defaults to the platform cache directory)
# cache_dir = "/path/to/models"

show_download_progress = false

[keys]
# Index keys >= threshold decode to reviews (R), below it to medical records (P).
# Review ids and patient ids must stay on their side of this value.
review_threshold = {threshold}

[indexing]
# Rows read from the store per batch
batch_size = {indexing_batch}

[query]
default_top_k = {top_k}

[logging]
# tracing filter used when RUST_LOG is not set
level = "{level}"
"#,
            version = defaults.version,
            index_path = defaults.index_path.display(),
            url = defaults.database.url,
            max_connections = defaults.database.max_connections,
            model = defaults.embedding.model,
            dimension = defaults.embedding.dimension,
            embedding_batch = defaults.embedding.batch_size,
            threshold = defaults.keys.review_threshold,
            indexing_batch = defaults.indexing.batch_size,
            top_k = defaults.query.default_top_k,
            level = defaults.logging.level,
        );

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}
