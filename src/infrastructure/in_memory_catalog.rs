//! In-memory [`BarcodeSource`] for tests, benchmarks and embedding hosts
//!
//! Mirrors the SQLite schema: A items with a delimited barcode field, B
//! products, and an append-only B barcode log. Supports simple fault
//! injection so batch failure handling can be exercised without a database.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::RwLock;

use crate::domain::barcode::{ABarcodeField, BLogEntry};
use crate::domain::repositories::{BFilter, BarcodeSource, StorageError};

#[derive(Debug, Clone)]
struct BProduct {
    vendor_code: String,
    internal_id: Option<String>,
}

#[derive(Debug, Default)]
struct CatalogState {
    a_items: BTreeMap<String, Option<String>>,
    b_products: BTreeMap<String, BProduct>,
    b_log: Vec<(i64, String, String)>,
    offline: bool,
    failing_a_ids: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

fn poisoned() -> StorageError {
    StorageError::unavailable("in-memory catalog lock poisoned")
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_a_item(&self, a_id: impl Into<String>, barcodes: Option<&str>) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.a_items.insert(a_id.into(), barcodes.map(str::to_string));
        Ok(())
    }

    pub fn add_b_product(
        &self,
        b_id: impl Into<String>,
        vendor_code: impl Into<String>,
        internal_id: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.b_products.insert(
            b_id.into(),
            BProduct { vendor_code: vendor_code.into(), internal_id: internal_id.map(str::to_string) },
        );
        Ok(())
    }

    /// Append to the B barcode log; the product must exist
    pub fn append_b_barcode(&self, b_id: &str, barcode: &str) -> Result<i64, StorageError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if !state.b_products.contains_key(b_id) {
            return Err(StorageError::query(format!("unknown B product {b_id}")));
        }
        let seq = state.b_log.len() as i64 + 1;
        state.b_log.push((seq, b_id.to_string(), barcode.to_string()));
        Ok(seq)
    }

    /// Every read fails with `Unavailable` while offline
    pub fn set_offline(&self, offline: bool) -> Result<(), StorageError> {
        self.state.write().map_err(|_| poisoned())?.offline = offline;
        Ok(())
    }

    /// A reads whose ID filter contains `a_id` fail with `Unavailable`
    pub fn fail_a_reads_for(&self, a_id: impl Into<String>) -> Result<(), StorageError> {
        self.state.write().map_err(|_| poisoned())?.failing_a_ids.insert(a_id.into());
        Ok(())
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, CatalogState>, StorageError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        if state.offline {
            return Err(StorageError::unavailable("in-memory catalog is offline"));
        }
        Ok(state)
    }
}

fn has_barcodes(raw: &Option<String>) -> bool {
    raw.as_deref().is_some_and(|r| !r.trim().is_empty())
}

#[async_trait]
impl BarcodeSource for InMemoryCatalog {
    async fn a_barcode_fields(&self, filter: Option<&[String]>) -> Result<Vec<ABarcodeField>, StorageError> {
        let state = self.read_state()?;
        let Some(ids) = filter else {
            return Ok(state
                .a_items
                .iter()
                .filter(|(_, raw)| has_barcodes(raw))
                .filter_map(|(id, raw)| raw.as_ref().map(|r| ABarcodeField::new(id.clone(), r.clone())))
                .collect());
        };

        if let Some(id) = ids.iter().find(|id| state.failing_a_ids.contains(*id)) {
            return Err(StorageError::unavailable(format!("injected failure reading A item {id}")));
        }
        let wanted: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| {
                state.a_items.get(id)?.as_ref().map(|raw| ABarcodeField::new(id, raw.clone()))
            })
            .collect())
    }

    async fn a_item_ids_with_barcodes(&self) -> Result<Vec<String>, StorageError> {
        let state = self.read_state()?;
        Ok(state
            .a_items
            .iter()
            .filter(|(_, raw)| has_barcodes(raw))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn b_barcode_log(&self, filter: &BFilter) -> Result<Vec<BLogEntry>, StorageError> {
        let state = self.read_state()?;
        let touched: HashSet<&str> = state
            .b_products
            .iter()
            .filter(|(b_id, p)| filter.accepts(b_id, &p.vendor_code, p.internal_id.as_deref()))
            .map(|(_, p)| p.vendor_code.as_str())
            .collect();

        Ok(state
            .b_log
            .iter()
            .filter_map(|(seq, b_id, barcode)| {
                let product = state.b_products.get(b_id)?;
                touched.contains(product.vendor_code.as_str()).then(|| BLogEntry {
                    seq: *seq,
                    b_id: b_id.clone(),
                    vendor_code: product.vendor_code.clone(),
                    internal_id: product.internal_id.clone(),
                    barcode: barcode.clone(),
                })
            })
            .collect())
    }
}
