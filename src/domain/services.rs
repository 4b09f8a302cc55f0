//! Domain services: the pure stages of the barcode linking pipeline
//!
//! Only the normalizer touches storage (through [`crate::domain::repositories::BarcodeSource`]);
//! everything downstream is in-memory.

pub mod actual_barcode;
pub mod deduplicator;
pub mod matcher;
pub mod normalizer;
pub mod pipeline;
pub mod primary_link;

pub use actual_barcode::{mark_actual, VendorMaxima};
pub use deduplicator::{dedup, DedupKey};
pub use matcher::{hash_join, match_barcodes, match_barcodes_with, BarcodeIndex, BuildSide};
pub use normalizer::{BarcodeNormalizer, BarcodeResolver, NormalizedA, RankedB};
pub use primary_link::{select_primary, PrimarySelection};
