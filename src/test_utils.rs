//! Test utilities for catalog-linker
//!
//! Provides common testing infrastructure so tests are isolated and use
//! the same catalog fixtures, both on SQLite and in memory.

use anyhow::Result;
use std::sync::Arc;

use crate::infrastructure::{DatabaseConnection, InMemoryCatalog, SqliteBarcodeRepository};

/// Test database configuration
pub struct TestDatabase {
    pub connection: DatabaseConnection,
}

impl TestDatabase {
    /// Create a new in-memory test database
    ///
    /// Each test gets a fresh, clean database state.
    pub async fn new() -> Result<Self> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;
        Ok(Self { connection: db })
    }

    /// Get the database pool for use in repositories
    pub fn pool(&self) -> sqlx::Pool<sqlx::Sqlite> {
        self.connection.pool().clone()
    }

    pub fn repository(&self) -> SqliteBarcodeRepository {
        SqliteBarcodeRepository::new(self.pool())
    }
}

/// One A item: id and raw delimited barcode field
pub type AFixture<'a> = (&'a str, Option<&'a str>);

/// One B product: id, vendor code, internal id
pub type BProductFixture<'a> = (&'a str, &'a str, Option<&'a str>);

/// One B log row in insertion order: product id, barcode
pub type BBarcodeFixture<'a> = (&'a str, &'a str);

/// The reference catalog:
/// - "1001" lists 111;222;333 and V1 inserted 222 then 999 (plain primary link)
/// - "2002" lists 555, currently listed by V2 and V3 (ambiguous)
/// - "3003" lists 777, which no vendor ever listed (unmatched)
pub const SAMPLE_A: &[AFixture<'static>] =
    &[("1001", Some("111;222;333")), ("2002", Some("555")), ("3003", Some("777"))];

pub const SAMPLE_B_PRODUCTS: &[BProductFixture<'static>] =
    &[("50", "V1", Some("9001")), ("51", "V2", None), ("60", "V3", Some("9003"))];

pub const SAMPLE_B_BARCODES: &[BBarcodeFixture<'static>] = &[("50", "222"), ("50", "999"), ("51", "555"), ("60", "555")];

/// Build an in-memory catalog from fixtures
pub fn in_memory_catalog(
    a_items: &[AFixture<'_>],
    b_products: &[BProductFixture<'_>],
    b_barcodes: &[BBarcodeFixture<'_>],
) -> Result<Arc<InMemoryCatalog>> {
    let catalog = InMemoryCatalog::new();
    for (a_id, barcodes) in a_items {
        catalog.add_a_item(*a_id, *barcodes)?;
    }
    for (b_id, vendor_code, internal_id) in b_products {
        catalog.add_b_product(*b_id, *vendor_code, *internal_id)?;
    }
    for (b_id, barcode) in b_barcodes {
        catalog.append_b_barcode(b_id, barcode)?;
    }
    Ok(Arc::new(catalog))
}

pub fn sample_catalog() -> Result<Arc<InMemoryCatalog>> {
    in_memory_catalog(SAMPLE_A, SAMPLE_B_PRODUCTS, SAMPLE_B_BARCODES)
}

/// Seed a SQLite repository with the same fixture shapes
pub async fn seed_repository(
    repo: &SqliteBarcodeRepository,
    a_items: &[AFixture<'_>],
    b_products: &[BProductFixture<'_>],
    b_barcodes: &[BBarcodeFixture<'_>],
) -> Result<()> {
    for (a_id, barcodes) in a_items {
        repo.upsert_a_item(a_id, *barcodes).await?;
    }
    for (b_id, vendor_code, internal_id) in b_products {
        repo.upsert_b_product(b_id, vendor_code, *internal_id).await?;
    }
    for (b_id, barcode) in b_barcodes {
        repo.append_b_barcode(b_id, barcode).await?;
    }
    Ok(())
}

/// Helper macros for common test patterns
#[macro_export]
macro_rules! test_db {
    () => {{
        $crate::test_utils::TestDatabase::new().await.expect("Failed to create test database")
    }};
}
