// Database connection and pool management
// This module handles SQLite catalog connections using sqlx

use sqlx::{sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::domain::repositories::StorageError;
use crate::infrastructure::config::DatabaseConfig;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        Self::with_max_connections(database_url, 8).await
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, StorageError> {
        Self::with_max_connections(&config.url, config.max_connections).await
    }

    async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let in_memory = database_url.contains(":memory:");

        if !in_memory {
            let db_path = database_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::Unavailable {
                        message: format!("cannot create database directory {}", parent.display()),
                        source: Some(Box::new(e)),
                    })?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to `sqlite::memory:` is its own database
        let max_connections = if in_memory { 1 } else { max_connections };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        info!("Connected to catalog database {} (max_connections={})", database_url, max_connections);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create the catalog read schema if missing (local and test databases)
    pub async fn migrate(&self) -> Result<(), StorageError> {
        let create_a_products_sql = r#"
            CREATE TABLE IF NOT EXISTS a_products (
                a_id TEXT PRIMARY KEY,
                barcodes TEXT
            )
        "#;

        let create_b_products_sql = r#"
            CREATE TABLE IF NOT EXISTS b_products (
                b_id TEXT PRIMARY KEY,
                vendor_code TEXT NOT NULL,
                internal_id TEXT
            )
        "#;

        let create_b_barcodes_sql = r#"
            CREATE TABLE IF NOT EXISTS b_barcodes (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                b_id TEXT NOT NULL,
                barcode TEXT NOT NULL,
                FOREIGN KEY (b_id) REFERENCES b_products (b_id) ON DELETE CASCADE
            )
        "#;

        let create_indexes_sql = r#"
            CREATE INDEX IF NOT EXISTS idx_b_products_vendor_code ON b_products (vendor_code);
            CREATE INDEX IF NOT EXISTS idx_b_products_internal_id ON b_products (internal_id);
            CREATE INDEX IF NOT EXISTS idx_b_barcodes_b_id ON b_barcodes (b_id);
        "#;

        sqlx::query(create_a_products_sql).execute(&self.pool).await?;
        sqlx::query(create_b_products_sql).execute(&self.pool).await?;
        sqlx::query(create_b_barcodes_sql).execute(&self.pool).await?;
        sqlx::raw_sql(create_indexes_sql).execute(&self.pool).await?;

        Ok(())
    }
}
