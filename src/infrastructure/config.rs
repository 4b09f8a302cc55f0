//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate:
//! 1. Built-in defaults (`AppConfig::default()`)
//! 2. An optional TOML file (`catalog-linker.toml` or an explicit path)
//! 3. Environment variables, e.g. `CATALOG_LINKER__ENGINE__BATCH__BATCH_SIZE=500`

#![allow(clippy::uninlined_format_args)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::domain::link::DedupMode;

pub const ENV_PREFIX: &str = "CATALOG_LINKER";
pub const DEFAULT_CONFIG_FILE: &str = "catalog-linker";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Default values for all settings
pub mod defaults {
    pub const DATABASE_URL: &str = "sqlite:catalog.db";
    pub const DATABASE_MAX_CONNECTIONS: u32 = 8;

    pub const BATCH_SIZE: usize = 1000;
    pub const LIST_AUTO_BATCH_THRESHOLD: usize = 10_000;
    pub const CATALOG_AUTO_BATCH_THRESHOLD: usize = 50_000;
    pub const MAX_PARALLEL_BATCHES: usize = 1;

    pub const A_BARCODE_DELIMITER: &str = ";";
    pub const REQUIRE_NUMERIC_IDS: bool = true;

    pub const CACHE_ENABLED: bool = false;
    pub const CACHE_TTL_SECS: u64 = 300;
    pub const CACHE_MAX_ENTRIES: usize = 64;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = false;
    pub const LOG_FILE_NAME: &str = "catalog-linker.log";
    pub const LOG_MAX_FILES: u32 = 7;
    pub const LOG_KEEP_ONLY_LATEST: bool = false;
    pub const LOG_UTC_OFFSET_HOURS: i32 = 0;
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL of the catalog store
    pub url: String,
    pub max_connections: u32,
}

/// Linking engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub batch: BatchConfig,
    pub dedup_mode: DedupMode,
    /// Single-character delimiter of Marketplace A's barcode field
    pub a_barcode_delimiter: String,
    /// Reject non-numeric item IDs (both marketplaces use numeric item IDs)
    pub require_numeric_ids: bool,
    pub cache: CacheConfig,
}

/// Batch processing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of A items per batch
    pub batch_size: usize,

    /// Explicit ID lists longer than this are batched automatically
    pub list_auto_batch_threshold: usize,

    /// Full-catalog runs larger than this are batched automatically
    pub catalog_auto_batch_threshold: usize,

    /// Batches fetched concurrently (1 = sequential)
    pub max_parallel_batches: usize,

    /// Batch regardless of input size
    pub force_batching: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output (stderr, stdout carries command output)
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Log directory; defaults to `logs/` next to the executable
    pub log_dir: Option<String>,

    pub file_name: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Keep only the most recent log file (delete all others)
    pub keep_only_latest: bool,

    /// Fixed UTC offset used for timestamps
    pub utc_offset_hours: i32,

    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
            max_connections: defaults::DATABASE_MAX_CONNECTIONS,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            dedup_mode: DedupMode::default(),
            a_barcode_delimiter: defaults::A_BARCODE_DELIMITER.to_string(),
            require_numeric_ids: defaults::REQUIRE_NUMERIC_IDS,
            cache: CacheConfig::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            list_auto_batch_threshold: defaults::LIST_AUTO_BATCH_THRESHOLD,
            catalog_auto_batch_threshold: defaults::CATALOG_AUTO_BATCH_THRESHOLD,
            max_parallel_batches: defaults::MAX_PARALLEL_BATCHES,
            force_batching: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::CACHE_ENABLED,
            ttl_secs: defaults::CACHE_TTL_SECS,
            max_entries: defaults::CACHE_MAX_ENTRIES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            keep_only_latest: defaults::LOG_KEEP_ONLY_LATEST,
            utc_offset_hours: defaults::LOG_UTC_OFFSET_HOURS,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("catalog_linker_lib".to_string(), defaults::LOG_LEVEL.to_string());
                filters
            },
        }
    }
}

impl BatchConfig {
    /// Should an input of `len` items be split into batches
    pub const fn should_batch(&self, len: usize, full_catalog: bool) -> bool {
        let threshold = if full_catalog {
            self.catalog_auto_batch_threshold
        } else {
            self.list_auto_batch_threshold
        };
        self.force_batching || len > threshold
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Validation { message: "batch.batch_size must be greater than 0".to_string() });
        }
        if self.max_parallel_batches == 0 {
            return Err(ConfigError::Validation {
                message: "batch.max_parallel_batches must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

impl CacheConfig {
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl EngineConfig {
    /// The A delimiter as a char; only valid after [`EngineConfig::validate`]
    pub fn delimiter(&self) -> char {
        self.a_barcode_delimiter.chars().next().unwrap_or(';')
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.batch.validate()?;

        let mut chars = self.a_barcode_delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_whitespace() => {}
            _ => {
                return Err(ConfigError::Validation {
                    message: format!(
                        "a_barcode_delimiter must be a single non-whitespace character, got {:?}",
                        self.a_barcode_delimiter
                    ),
                });
            }
        }

        if self.cache.enabled && (self.cache.ttl_secs == 0 || self.cache.max_entries == 0) {
            return Err(ConfigError::Validation {
                message: "cache.ttl_secs and cache.max_entries must be greater than 0 when caching is enabled"
                    .to_string(),
            });
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load defaults, then `catalog-linker.toml` in the working directory if present, then env
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(None)
    }

    /// Load with an explicit config file, which must exist
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::build(Some(path.as_ref()))
    }

    fn build(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        info!(
            "Configuration loaded: batch_size={}, dedup_mode={}, cache_enabled={}",
            config.engine.batch.batch_size, config.engine.dedup_mode, config.engine.cache.enabled
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation { message: "database.url must not be empty".to_string() });
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation {
                message: "database.max_connections must be greater than 0".to_string(),
            });
        }
        self.engine.validate()
    }
}
