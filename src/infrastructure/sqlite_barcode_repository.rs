//! SQLite implementation of [`BarcodeSource`]
//!
//! Reads the catalog tables created by [`super::database_connection::DatabaseConnection::migrate`].
//! Large ID lists are split into chunks to stay under SQLite's bound
//! parameter limit.

#![allow(clippy::uninlined_format_args)]

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::domain::barcode::{ABarcodeField, BLogEntry};
use crate::domain::repositories::{BFilter, BarcodeSource, StorageError};

/// Bound parameters per `IN (...)` list
const IN_CHUNK_SIZE: usize = 500;

const B_LOG_SELECT: &str = r#"
    SELECT bb.seq, bb.b_id, bp.vendor_code, bp.internal_id, bb.barcode
    FROM b_barcodes bb
    JOIN b_products bp ON bp.b_id = bb.b_id
"#;

#[derive(Clone)]
pub struct SqliteBarcodeRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteBarcodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ===============================
    // WRITE HELPERS (fixtures and imports)
    // ===============================

    pub async fn upsert_a_item(&self, a_id: &str, barcodes: Option<&str>) -> Result<(), StorageError> {
        sqlx::query("INSERT OR REPLACE INTO a_products (a_id, barcodes) VALUES (?, ?)")
            .bind(a_id)
            .bind(barcodes)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    pub async fn upsert_b_product(
        &self,
        b_id: &str,
        vendor_code: &str,
        internal_id: Option<&str>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO b_products (b_id, vendor_code, internal_id) VALUES (?, ?, ?)
            ON CONFLICT (b_id) DO UPDATE SET vendor_code = excluded.vendor_code, internal_id = excluded.internal_id
            "#,
        )
        .bind(b_id)
        .bind(vendor_code)
        .bind(internal_id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Append one row to the B barcode log, returning its sequence number
    pub async fn append_b_barcode(&self, b_id: &str, barcode: &str) -> Result<i64, StorageError> {
        let result = sqlx::query("INSERT INTO b_barcodes (b_id, barcode) VALUES (?, ?)")
            .bind(b_id)
            .bind(barcode)
            .execute(&*self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    // ===============================
    // READ HELPERS
    // ===============================

    async fn a_fields_in(&self, ids: &[String]) -> Result<Vec<ABarcodeField>, StorageError> {
        let mut fields = Vec::new();
        for chunk in ids.chunks(IN_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT a_id, barcodes FROM a_products WHERE barcodes IS NOT NULL AND a_id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id);
            }
            separated.push_unseparated(") ORDER BY a_id");

            let rows = builder.build().fetch_all(&*self.pool).await?;
            for row in rows {
                fields.push(ABarcodeField::new(row.try_get::<String, _>("a_id")?, row.try_get::<String, _>("barcodes")?));
            }
        }
        Ok(fields)
    }

    /// Vendor codes of the B products selected by `filter`
    async fn touched_vendor_codes(&self, filter: &BFilter) -> Result<BTreeSet<String>, StorageError> {
        // One list goes to SQL, the rest is checked row by row
        let (column, values) = match (&filter.b_ids, &filter.vendor_codes, &filter.internal_ids) {
            (Some(ids), _, _) => ("b_id", ids),
            (None, Some(codes), _) => ("vendor_code", codes),
            (None, None, Some(ids)) => ("internal_id", ids),
            (None, None, None) => {
                let rows = sqlx::query("SELECT DISTINCT vendor_code FROM b_products")
                    .fetch_all(&*self.pool)
                    .await?;
                return rows.iter().map(|r| r.try_get::<String, _>("vendor_code").map_err(Into::into)).collect();
            }
        };

        let mut codes = BTreeSet::new();
        for chunk in values.chunks(IN_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("SELECT b_id, vendor_code, internal_id FROM b_products WHERE {} IN (", column));
            let mut separated = builder.separated(", ");
            for value in chunk {
                separated.push_bind(value);
            }
            separated.push_unseparated(")");

            for row in builder.build().fetch_all(&*self.pool).await? {
                let b_id: String = row.try_get("b_id")?;
                let vendor_code: String = row.try_get("vendor_code")?;
                let internal_id: Option<String> = row.try_get("internal_id")?;
                if filter.accepts(&b_id, &vendor_code, internal_id.as_deref()) {
                    codes.insert(vendor_code);
                }
            }
        }
        Ok(codes)
    }

    fn log_entry(row: &sqlx::sqlite::SqliteRow) -> Result<BLogEntry, StorageError> {
        Ok(BLogEntry {
            seq: row.try_get("seq")?,
            b_id: row.try_get("b_id")?,
            vendor_code: row.try_get("vendor_code")?,
            internal_id: row.try_get("internal_id")?,
            barcode: row.try_get("barcode")?,
        })
    }
}

#[async_trait]
impl BarcodeSource for SqliteBarcodeRepository {
    async fn a_barcode_fields(&self, filter: Option<&[String]>) -> Result<Vec<ABarcodeField>, StorageError> {
        if let Some(ids) = filter {
            return self.a_fields_in(ids).await;
        }

        let rows = sqlx::query(
            r#"
            SELECT a_id, barcodes FROM a_products
            WHERE barcodes IS NOT NULL AND TRIM(barcodes) <> ''
            ORDER BY a_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;

        rows.iter()
            .map(|row| Ok::<_, StorageError>(ABarcodeField::new(row.try_get::<String, _>("a_id")?, row.try_get::<String, _>("barcodes")?)))
            .collect()
    }

    async fn a_item_ids_with_barcodes(&self) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT a_id FROM a_products
            WHERE barcodes IS NOT NULL AND TRIM(barcodes) <> ''
            ORDER BY a_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(|row| row.try_get::<String, _>("a_id").map_err(Into::into)).collect()
    }

    async fn b_barcode_log(&self, filter: &BFilter) -> Result<Vec<BLogEntry>, StorageError> {
        if filter.is_unfiltered() {
            let rows = sqlx::query(&format!("{} ORDER BY bb.seq", B_LOG_SELECT))
                .fetch_all(&*self.pool)
                .await?;
            return rows.iter().map(Self::log_entry).collect();
        }

        let codes: Vec<String> = self.touched_vendor_codes(filter).await?.into_iter().collect();
        let mut entries = Vec::new();
        for chunk in codes.chunks(IN_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(B_LOG_SELECT);
            builder.push(" WHERE bp.vendor_code IN (");
            let mut separated = builder.separated(", ");
            for code in chunk {
                separated.push_bind(code);
            }
            separated.push_unseparated(")");

            for row in builder.build().fetch_all(&*self.pool).await? {
                entries.push(Self::log_entry(&row)?);
            }
        }
        entries.sort_by_key(|e| e.seq);
        debug!("Read {} B log rows for {} vendor codes", entries.len(), codes.len());
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;

    async fn seeded() -> anyhow::Result<SqliteBarcodeRepository> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;
        let repo = SqliteBarcodeRepository::new(db.pool().clone());

        repo.upsert_a_item("1001", Some("111;222;333")).await?;
        repo.upsert_a_item("2002", Some("555")).await?;
        repo.upsert_a_item("4004", Some("  ")).await?;
        repo.upsert_a_item("5005", None).await?;

        repo.upsert_b_product("50", "V1", Some("900")).await?;
        repo.upsert_b_product("51", "V1", None).await?;
        repo.upsert_b_product("60", "V3", None).await?;
        repo.append_b_barcode("50", "222").await?;
        repo.append_b_barcode("60", "555").await?;
        repo.append_b_barcode("51", "999").await?;
        Ok(repo)
    }

    #[tokio::test]
    async fn lists_only_items_with_barcodes() -> anyhow::Result<()> {
        let repo = seeded().await?;
        assert_eq!(repo.a_item_ids_with_barcodes().await?, vec!["1001", "2002"]);

        let fields = repo.a_barcode_fields(None).await?;
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].raw_barcodes, "111;222;333");
        Ok(())
    }

    #[tokio::test]
    async fn explicit_ids_are_read_in_chunks() -> anyhow::Result<()> {
        let repo = seeded().await?;
        let mut ids: Vec<String> = (0..1200).map(|i| format!("x{i}")).collect();
        ids.push("2002".into());

        let fields = repo.a_barcode_fields(Some(ids.as_slice())).await?;
        assert_eq!(fields, vec![ABarcodeField::new("2002", "555")]);
        Ok(())
    }

    #[tokio::test]
    async fn filtered_log_covers_whole_vendor() -> anyhow::Result<()> {
        let repo = seeded().await?;
        let log = repo.b_barcode_log(&BFilter::by_ids(vec!["51".into()])).await?;

        let got: Vec<(&str, &str)> = log.iter().map(|e| (e.b_id.as_str(), e.barcode.as_str())).collect();
        assert_eq!(got, vec![("50", "222"), ("51", "999")]);
        assert!(log.windows(2).all(|w| w[0].seq < w[1].seq));
        Ok(())
    }

    #[tokio::test]
    async fn internal_id_filter_resolves_vendor() -> anyhow::Result<()> {
        let repo = seeded().await?;
        let log = repo.b_barcode_log(&BFilter::by_internal_ids(vec!["900".into()])).await?;
        assert!(log.iter().all(|e| e.vendor_code == "V1"));
        assert_eq!(log[0].internal_id.as_deref(), Some("900"));
        Ok(())
    }

    #[tokio::test]
    async fn unfiltered_log_is_in_insertion_order() -> anyhow::Result<()> {
        let repo = seeded().await?;
        let log = repo.b_barcode_log(&BFilter::all()).await?;
        let barcodes: Vec<&str> = log.iter().map(|e| e.barcode.as_str()).collect();
        assert_eq!(barcodes, vec!["222", "555", "999"]);
        Ok(())
    }

    #[tokio::test]
    async fn closed_pool_is_unavailable() -> anyhow::Result<()> {
        let repo = seeded().await?;
        repo.pool().close().await;
        let err = repo.a_item_ids_with_barcodes().await;
        assert!(matches!(err, Err(StorageError::Unavailable { .. })));
        Ok(())
    }
}
