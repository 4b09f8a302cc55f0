//! Public entry point of the linking engine
//!
//! `LinkEngine` owns the storage collaborator, the validated engine
//! settings and an optional injected [`ResultCache`]. It is stateless per
//! call apart from that cache, and safe to share across tasks.

#![allow(clippy::uninlined_format_args)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::batch_orchestrator::{BatchOrchestrator, CatalogScope};
use crate::application::result_cache::{CacheKey, ResultCache};
use crate::domain::collection::{CollectionResult, Stats};
use crate::domain::errors::LinkResult;
use crate::domain::identifiers::validate_ids;
use crate::domain::link::{DedupMode, LinkDirection, LinkRow, ResolvedLink};
use crate::domain::repositories::{BFilter, BarcodeSource};
use crate::domain::services::pipeline::{dedup_stage, run};
use crate::domain::services::{BarcodeNormalizer, BarcodeResolver, DedupKey};
use crate::infrastructure::config::{BatchConfig, EngineConfig};

pub struct LinkEngine {
    source: Arc<dyn BarcodeSource>,
    config: EngineConfig,
    normalizer: BarcodeNormalizer,
    orchestrator: BatchOrchestrator,
    cache: Option<Arc<ResultCache>>,
}

impl LinkEngine {
    pub fn new(source: Arc<dyn BarcodeSource>, config: EngineConfig) -> LinkResult<Self> {
        config.validate()?;
        let normalizer = BarcodeNormalizer::new(config.delimiter());
        let orchestrator = BatchOrchestrator::new(Arc::clone(&source), normalizer, config.require_numeric_ids);
        Ok(Self { source, config, normalizer, orchestrator, cache: None })
    }

    /// Attach a result cache for `collect_for_catalog`
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// Run match → actual → primary over the selected slices of both catalogs
    async fn resolve(&self, a_ids: Option<&[String]>, b_filter: &BFilter) -> LinkResult<Vec<ResolvedLink>> {
        let a = self.normalizer.fetch(self.source.as_ref(), a_ids).await?;
        let b = BarcodeResolver.fetch(self.source.as_ref(), b_filter).await?;
        if a.no_valid_input || b.no_valid_input {
            return Ok(Vec::new());
        }
        let mut stats = Stats::default();
        let links = run(&a.records, &b.records, &mut stats);
        debug!(
            "Resolved {} links from {} A records and {} B records in {:?}",
            links.len(),
            a.records.len(),
            b.records.len(),
            stats.stage_timings_ms
        );
        Ok(links)
    }

    /// `None` when the caller supplied a list but nothing in it was valid
    fn validated(&self, raw: &[String]) -> Option<Vec<String>> {
        let validated = validate_ids(raw, self.config.require_numeric_ids);
        (!validated.no_valid_input()).then_some(validated.ids)
    }

    /// Validate every list of a B filter.
    ///
    /// Item IDs follow the configured numeric rule; vendor codes and internal
    /// IDs only have to be non-empty. `None` when a supplied list has nothing
    /// valid left.
    fn validated_filter(&self, filter: BFilter) -> Option<BFilter> {
        let check = |list: Option<Vec<String>>, numeric: bool| match list {
            None => Some(None),
            Some(raw) => {
                let validated = validate_ids(&raw, numeric);
                (!validated.no_valid_input()).then_some(Some(validated.ids))
            }
        };
        Some(BFilter {
            b_ids: check(filter.b_ids, self.config.require_numeric_ids)?,
            vendor_codes: check(filter.vendor_codes, false)?,
            internal_ids: check(filter.internal_ids, false)?,
        })
    }

    /// Primary B links for each A id, deduplicated with the configured mode
    pub async fn link_a_to_b(&self, a_ids: &[String]) -> LinkResult<HashMap<String, Vec<String>>> {
        self.link_a_to_b_with_mode(a_ids, self.config.dedup_mode).await
    }

    pub async fn link_a_to_b_with_mode(
        &self,
        a_ids: &[String],
        mode: DedupMode,
    ) -> LinkResult<HashMap<String, Vec<String>>> {
        let Some(ids) = self.validated(a_ids) else {
            return Ok(HashMap::new());
        };
        let links = self.resolve(Some(ids.as_slice()), &BFilter::all()).await?;
        Ok(primary_map(links, mode, LinkDirection::AToB))
    }

    /// Primary A links for each B id, deduplicated with the configured mode
    pub async fn link_b_to_a(&self, b_ids: &[String]) -> LinkResult<HashMap<String, Vec<String>>> {
        self.link_b_to_a_with_mode(b_ids, self.config.dedup_mode).await
    }

    pub async fn link_b_to_a_with_mode(
        &self,
        b_ids: &[String],
        mode: DedupMode,
    ) -> LinkResult<HashMap<String, Vec<String>>> {
        self.link_b_to_a_by(BFilter::by_ids(b_ids.to_vec()), mode).await
    }

    /// Primary A links for each B product selected by `filter`.
    ///
    /// B products can be chosen by item ID, vendor code or internal product
    /// ID; results are keyed by B item ID whichever was used.
    pub async fn link_b_to_a_by(
        &self,
        filter: BFilter,
        mode: DedupMode,
    ) -> LinkResult<HashMap<String, Vec<String>>> {
        let Some(filter) = self.validated_filter(filter) else {
            return Ok(HashMap::new());
        };
        let links = self.resolve(None, &filter).await?;
        Ok(primary_map(links, mode, LinkDirection::BToA))
    }

    /// Bidirectional link table, one row per `(a_id, b_id)` preferring the primary row
    pub async fn get_all_links(
        &self,
        a_ids: Option<&[String]>,
        b_ids: Option<&[String]>,
    ) -> LinkResult<Vec<LinkRow>> {
        let b_filter = b_ids.map_or_else(BFilter::all, |ids| BFilter::by_ids(ids.to_vec()));
        self.get_all_links_by(a_ids, b_filter).await
    }

    /// As [`Self::get_all_links`] with an arbitrary B-side filter
    pub async fn get_all_links_by(&self, a_ids: Option<&[String]>, b_filter: BFilter) -> LinkResult<Vec<LinkRow>> {
        let a_filter = match a_ids {
            Some(raw) => match self.validated(raw) {
                Some(ids) => Some(ids),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let Some(b_filter) = self.validated_filter(b_filter) else {
            return Ok(Vec::new());
        };

        let links = self.resolve(a_filter.as_deref(), &b_filter).await?;
        let mut stats = Stats::default();
        let mut rows: Vec<LinkRow> = dedup_stage(links, DedupKey::ABPair, &mut stats)
            .into_iter()
            .map(LinkRow::from)
            .collect();
        rows.sort_by(|l, r| {
            (&l.a_id, &l.b_vendor_code, &l.b_id).cmp(&(&r.a_id, &r.b_vendor_code, &r.b_id))
        });
        Ok(rows)
    }

    /// Catalog-scale reconciliation, batched automatically above the configured thresholds
    pub async fn collect_for_catalog(
        &self,
        scope: CatalogScope,
        batch: &BatchConfig,
    ) -> LinkResult<Arc<CollectionResult>> {
        self.collect_for_catalog_with_cancel(scope, batch, &CancellationToken::new()).await
    }

    /// As [`Self::collect_for_catalog`]; batches not yet started when `cancel`
    /// fires are skipped and the result is flagged `cancelled`.
    pub async fn collect_for_catalog_with_cancel(
        &self,
        scope: CatalogScope,
        batch: &BatchConfig,
        cancel: &CancellationToken,
    ) -> LinkResult<Arc<CollectionResult>> {
        batch.validate()?;

        let key = self.cache.as_ref().map(|_| {
            let explicit = match &scope {
                CatalogScope::All => None,
                CatalogScope::Explicit(ids) => Some(ids.as_slice()),
            };
            CacheKey::for_request(explicit, batch, &self.config)
        });

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key).await {
                info!("📦 Serving collection result from cache ({})", key.to_hex());
                return Ok(hit);
            }
        }

        let result = Arc::new(self.orchestrator.run(scope, batch, cancel).await?);

        // Partial results are never cached
        let complete = !result.stats.cancelled && result.stats.failed_batches == 0;
        if let (Some(cache), Some(key), true) = (&self.cache, key, complete) {
            cache.insert(key, Arc::clone(&result)).await;
        }
        Ok(result)
    }

    pub async fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all().await;
        }
    }
}

/// Group primary links by the queried side, values sorted and unique
fn primary_map(links: Vec<ResolvedLink>, mode: DedupMode, direction: LinkDirection) -> HashMap<String, Vec<String>> {
    let primary: Vec<ResolvedLink> = links.into_iter().filter(|l| l.is_primary).collect();
    let mut stats = Stats::default();
    let kept = dedup_stage(primary, DedupKey::for_mode(mode, direction), &mut stats);

    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for link in kept {
        let c = link.candidate;
        let (from, to) = match direction {
            LinkDirection::AToB => (c.a_id, c.b_id),
            LinkDirection::BToA => (c.b_id, c.a_id),
        };
        grouped.entry(from).or_default().push(to);
    }
    grouped
        .into_iter()
        .map(|(from, mut to)| {
            to.sort_unstable();
            to.dedup();
            (from, to)
        })
        .collect()
}
