//! Domain module - Core linking logic and entities
//!
//! This module contains the typed records, the storage interface the engine
//! reads through, and the pure pipeline stages that turn two barcode
//! catalogs into a deduplicated link table.

pub mod barcode;
pub mod collection;
pub mod errors;
pub mod identifiers;
pub mod link;
pub mod repositories;
pub mod services;

// Re-export commonly used items for convenience
pub use barcode::{ABarcodeField, BBarcodeRecord, BLogEntry, BarcodeRecord};
pub use collection::{AmbiguousMapping, CollectionResult, PipelineStage, Stats};
pub use errors::{LinkError, LinkResult};
pub use link::{DedupMode, LinkCandidate, LinkDirection, LinkRow, ResolvedLink};
pub use repositories::{BFilter, BarcodeSource, StorageError};
