//! Explicit TTL cache for catalog collection results
//!
//! Keyed by a blake3 digest of the normalized request signature. The cache
//! is owned by whoever builds the engine and injected into it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::collection::CollectionResult;
use crate::infrastructure::config::{BatchConfig, CacheConfig, EngineConfig};

/// Digest of a normalized collection request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Build a key from the request scope and every setting that changes the result.
    ///
    /// Explicit IDs are trimmed, sorted and deduplicated first, so
    /// `["2", " 1", "1"]` and `["1", "2"]` share an entry.
    pub fn for_request(explicit_ids: Option<&[String]>, batch: &BatchConfig, engine: &EngineConfig) -> Self {
        let mut hasher = blake3::Hasher::new();
        match explicit_ids {
            None => {
                hasher.update(b"scope:all\n");
            }
            Some(ids) => {
                let mut sorted: Vec<&str> = ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()).collect();
                sorted.sort_unstable();
                sorted.dedup();
                hasher.update(b"scope:explicit\n");
                for id in sorted {
                    hasher.update(id.as_bytes());
                    hasher.update(b"\n");
                }
            }
        }
        let settings = format!(
            "batch_size={};list_threshold={};catalog_threshold={};force={};dedup={};delimiter={};numeric={}",
            batch.batch_size,
            batch.list_auto_batch_threshold,
            batch.catalog_auto_batch_threshold,
            batch.force_batching,
            engine.dedup_mode,
            engine.a_barcode_delimiter,
            engine.require_numeric_ids,
        );
        hasher.update(settings.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

struct CacheEntry {
    inserted_at: Instant,
    value: Arc<CollectionResult>,
}

pub struct ResultCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl ResultCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `key`, if any
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<CollectionResult>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            debug!("Cache entry {} expired", key.to_hex());
            return None;
        }
        Some(Arc::clone(&entry.value))
    }

    /// Store a result, evicting the oldest entry when full
    pub async fn insert(&self, key: CacheKey, value: Arc<CollectionResult>) {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let oldest = entries.iter().min_by_key(|(_, e)| e.inserted_at).map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                debug!("Cache full, evicted {}", oldest.to_hex());
            }
        }
        entries.insert(key, CacheEntry { inserted_at: Instant::now(), value });
    }

    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Drop everything, e.g. after the underlying catalog changed
    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        debug!("Cache cleared ({} entries)", count);
    }

    /// Remove expired entries, returning how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
