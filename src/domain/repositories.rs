//! Read-only storage interfaces consumed by the linking engine
//!
//! The catalog tables (products, barcodes) belong to an external store; the
//! engine only reads them. Implementations must tolerate concurrent calls from
//! parallel batch workers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::barcode::{ABarcodeField, BLogEntry};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unreachable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Storage query failed: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into(), source: None }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query { message: message.into(), source: None }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                Self::Unavailable { message: err.to_string(), source: Some(Box::new(err)) }
            }
            other => Self::Query { message: other.to_string(), source: Some(Box::new(other)) },
        }
    }
}

/// Filters on Marketplace B products.
///
/// Set fields are AND-ed; an empty filter selects the whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BFilter {
    pub b_ids: Option<Vec<String>>,
    pub vendor_codes: Option<Vec<String>>,
    pub internal_ids: Option<Vec<String>>,
}

impl BFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_ids(ids: Vec<String>) -> Self {
        Self { b_ids: Some(ids), ..Self::default() }
    }

    pub fn by_vendor_codes(codes: Vec<String>) -> Self {
        Self { vendor_codes: Some(codes), ..Self::default() }
    }

    pub fn by_internal_ids(ids: Vec<String>) -> Self {
        Self { internal_ids: Some(ids), ..Self::default() }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.b_ids.is_none() && self.vendor_codes.is_none() && self.internal_ids.is_none()
    }

    /// Does a B product with these identifiers pass the filter
    pub fn accepts(&self, b_id: &str, vendor_code: &str, internal_id: Option<&str>) -> bool {
        let contains = |list: &Option<Vec<String>>, value: Option<&str>| match (list, value) {
            (None, _) => true,
            (Some(list), Some(value)) => list.iter().any(|v| v == value),
            (Some(_), None) => false,
        };
        contains(&self.b_ids, Some(b_id))
            && contains(&self.vendor_codes, Some(vendor_code))
            && contains(&self.internal_ids, internal_id)
    }
}

/// Storage collaborator for both marketplaces
#[async_trait]
pub trait BarcodeSource: Send + Sync {
    /// Raw A barcode fields. `None` selects every A item whose field is non-empty.
    async fn a_barcode_fields(&self, filter: Option<&[String]>) -> Result<Vec<ABarcodeField>, StorageError>;

    /// IDs of all A items with a non-empty barcode field, in stable order
    async fn a_item_ids_with_barcodes(&self) -> Result<Vec<String>, StorageError>;

    /// B barcode log rows in insertion order.
    ///
    /// Must cover every log row of every vendor code touched by `filter`,
    /// including rows of products the filter itself excludes, so that
    /// per-vendor insertion ranks do not depend on the filter.
    async fn b_barcode_log(&self, filter: &BFilter) -> Result<Vec<BLogEntry>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_accepts_everything() {
        let filter = BFilter::all();
        assert!(filter.is_unfiltered());
        assert!(filter.accepts("1", "V1", None));
    }

    #[test]
    fn filters_are_combined() {
        let filter = BFilter {
            b_ids: Some(vec!["1".into(), "2".into()]),
            vendor_codes: Some(vec!["V1".into()]),
            internal_ids: None,
        };
        assert!(filter.accepts("1", "V1", Some("9")));
        assert!(!filter.accepts("2", "V2", None));
        assert!(!filter.accepts("3", "V1", None));
    }

    #[test]
    fn internal_id_filter_rejects_missing_internal_id() {
        let filter = BFilter::by_internal_ids(vec!["9".into()]);
        assert!(filter.accepts("1", "V1", Some("9")));
        assert!(!filter.accepts("1", "V1", None));
    }

    #[test]
    fn pool_errors_map_to_unavailable() {
        assert!(matches!(StorageError::from(sqlx::Error::PoolClosed), StorageError::Unavailable { .. }));
        assert!(matches!(StorageError::from(sqlx::Error::RowNotFound), StorageError::Query { .. }));
    }
}
