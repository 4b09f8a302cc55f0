//! Catalog Linker - Cross-marketplace barcode linking engine
//!
//! Links Marketplace A items to Marketplace B products through shared
//! barcodes, picks the primary link per vendor code, and reconciles whole
//! catalogs in batches with unmatched and ambiguous reporting.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the engine surface for easier access
pub use application::{CatalogScope, LinkEngine, ResultCache};
pub use domain::{CollectionResult, DedupMode, LinkError, LinkResult, LinkRow, Stats};
