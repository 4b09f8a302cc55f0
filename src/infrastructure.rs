//! Infrastructure layer for configuration, logging and catalog storage
//!
//! This module provides the SQLite catalog reader, an in-memory catalog,
//! layered configuration loading and the tracing setup.

pub mod config;  // Layered settings (defaults, file, env)
pub mod database_connection;
pub mod in_memory_catalog;
pub mod logging;  // Logging infrastructure
pub mod sqlite_barcode_repository;

// Re-export commonly used items
pub use config::{AppConfig, BatchConfig, CacheConfig, ConfigError, EngineConfig};
pub use database_connection::DatabaseConnection;
pub use in_memory_catalog::InMemoryCatalog;
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use sqlite_barcode_repository::SqliteBarcodeRepository;
