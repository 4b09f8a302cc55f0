//! Application layer module
//!
//! This module contains the engine entry points that orchestrate the
//! domain pipeline: single-call link lookups, catalog-scale batched
//! collection and the result cache.

pub mod batch_orchestrator;
pub mod link_service;
pub mod result_cache;

pub use batch_orchestrator::{BatchOrchestrator, CatalogScope};
pub use link_service::LinkEngine;
pub use result_cache::{CacheKey, ResultCache};
