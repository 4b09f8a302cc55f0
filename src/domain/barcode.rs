//! Barcode records for both marketplaces
//!
//! Marketplace A stores every barcode of an item in one delimited field, so
//! storage hands us [`ABarcodeField`] rows that the normalizer expands.
//! Marketplace B keeps an append-only barcode log; storage hands us
//! [`BLogEntry`] rows in insertion order and the resolver ranks them per
//! vendor code into [`BBarcodeRecord`]s.

use serde::{Deserialize, Serialize};

/// Default delimiter of Marketplace A's multi-barcode field
pub const DEFAULT_A_DELIMITER: char = ';';

/// A single normalized barcode owned by a SKU / vendor code.
///
/// `position` is 1-based. On the A side it is the index within the original
/// delimited field; on the B side it is the insertion rank within the
/// owning vendor code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarcodeRecord {
    pub owner_id: String,
    pub barcode: String,
    pub position: u32,
}

impl BarcodeRecord {
    pub fn new(owner_id: impl Into<String>, barcode: impl Into<String>, position: u32) -> Self {
        Self {
            owner_id: owner_id.into(),
            barcode: barcode.into(),
            position,
        }
    }
}

/// Raw Marketplace A row: item id plus its unsplit barcode field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ABarcodeField {
    pub a_id: String,
    pub raw_barcodes: String,
}

impl ABarcodeField {
    pub fn new(a_id: impl Into<String>, raw_barcodes: impl Into<String>) -> Self {
        Self {
            a_id: a_id.into(),
            raw_barcodes: raw_barcodes.into(),
        }
    }
}

/// Raw Marketplace B log row, joined with product metadata.
///
/// `seq` is the global insertion sequence of the log; only its relative
/// order matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BLogEntry {
    pub seq: i64,
    pub b_id: String,
    pub vendor_code: String,
    pub internal_id: Option<String>,
    pub barcode: String,
}

/// Ranked Marketplace B barcode with the identifiers of the owning product
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BBarcodeRecord {
    pub b_id: String,
    pub vendor_code: String,
    pub internal_id: Option<String>,
    pub barcode: String,
    pub position: u32,
}

impl BBarcodeRecord {
    /// View as a plain [`BarcodeRecord`] owned by the vendor code
    pub fn as_barcode_record(&self) -> BarcodeRecord {
        BarcodeRecord::new(&self.vendor_code, &self.barcode, self.position)
    }
}

/// Trim a raw barcode token; `None` when nothing is left
pub fn clean_barcode(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
