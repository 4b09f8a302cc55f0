//! Engine-level error type
//!
//! Only conditions the caller must act on are errors. Dropped input IDs,
//! empty storage reads and single failed batches are reported through
//! `Stats` instead.

use thiserror::Error;

use crate::domain::repositories::StorageError;
use crate::infrastructure::config::ConfigError;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    #[error("Invalid engine configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type LinkResult<T> = Result<T, LinkError>;
