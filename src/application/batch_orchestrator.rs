//! Catalog-scale collection with automatic batching
//!
//! A run happens in two phases:
//! 1. Every batch of A items is fetched, normalized and probed against one
//!    shared B index. Batches may run concurrently.
//! 2. Per-batch vendor maxima are merged by `max`, and every batch is
//!    resolved against the merged maxima before being reported.
//!
//! Resolving against the merged maxima makes a batched run produce exactly
//! the result of a single unbatched run over the same list.
//!
//! Collection always builds the hash index on the B side and probes it with
//! each A batch, whichever side is smaller; `BuildSide::Auto` applies only to
//! the single-shot lookups in `link_service`.

#![allow(clippy::uninlined_format_args)]

use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::collection::{CollectionResult, PipelineStage, Stats};
use crate::domain::errors::{LinkError, LinkResult};
use crate::domain::identifiers::validate_ids;
use crate::domain::link::LinkCandidate;
use crate::domain::repositories::{BFilter, BarcodeSource, StorageError};
use crate::domain::services::pipeline::{probe_stage, report, resolve_stage};
use crate::domain::services::{BarcodeIndex, BarcodeNormalizer, BarcodeResolver, VendorMaxima};
use crate::infrastructure::config::BatchConfig;

/// Which A items a collection run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogScope {
    /// Every A item with a non-empty barcode field
    All,
    /// A caller-supplied ID list, validated before use
    Explicit(Vec<String>),
}

impl CatalogScope {
    pub fn explicit<S: AsRef<str>>(ids: &[S]) -> Self {
        Self::Explicit(ids.iter().map(|s| s.as_ref().to_string()).collect())
    }

    pub fn is_full_catalog(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Phase 1 output of one batch that read successfully
struct ProbedBatch {
    index: usize,
    ids: Vec<String>,
    candidates: Vec<LinkCandidate>,
    maxima: VendorMaxima,
    stats: Stats,
}

enum BatchOutcome {
    Probed(ProbedBatch),
    Failed { index: usize, ids: Vec<String>, error: StorageError },
    Skipped { index: usize, ids: Vec<String> },
}

/// Runs collection for one engine configuration
#[derive(Clone)]
pub struct BatchOrchestrator {
    source: Arc<dyn BarcodeSource>,
    normalizer: BarcodeNormalizer,
    require_numeric_ids: bool,
}

impl BatchOrchestrator {
    pub fn new(source: Arc<dyn BarcodeSource>, normalizer: BarcodeNormalizer, require_numeric_ids: bool) -> Self {
        Self { source, normalizer, require_numeric_ids }
    }

    pub async fn run(
        &self,
        scope: CatalogScope,
        batch: &BatchConfig,
        cancel: &CancellationToken,
    ) -> LinkResult<CollectionResult> {
        let run_id = Uuid::new_v4();
        let span = info_span!("collect_for_catalog", run_id = %run_id, full_catalog = scope.is_full_catalog());
        let mut result = self.run_inner(scope, batch, cancel).instrument(span).await?;
        result.run_id = run_id;
        Ok(result)
    }

    async fn run_inner(
        &self,
        scope: CatalogScope,
        batch: &BatchConfig,
        cancel: &CancellationToken,
    ) -> LinkResult<CollectionResult> {
        let started = Instant::now();
        let full_catalog = scope.is_full_catalog();
        let mut run_stats = Stats::default();

        let ids = match scope {
            CatalogScope::Explicit(raw) => {
                let validated = validate_ids(&raw, self.require_numeric_ids);
                run_stats.invalid_input_count = validated.rejected.len() as u64;
                run_stats.warnings = validated.warnings();
                if validated.no_valid_input() {
                    warn!("No valid A ids among {} supplied, returning empty result", raw.len());
                    run_stats.no_valid_input = true;
                    run_stats.set_elapsed(started.elapsed());
                    return Ok(CollectionResult::empty(run_stats));
                }
                validated.ids
            }
            CatalogScope::All => {
                let fetch_started = Instant::now();
                let ids = self.source.a_item_ids_with_barcodes().await?;
                run_stats.record_stage(PipelineStage::FetchA, fetch_started.elapsed());
                ids
            }
        };

        if ids.is_empty() {
            info!("Catalog has no A items with barcodes");
            run_stats.set_elapsed(started.elapsed());
            return Ok(CollectionResult::empty(run_stats));
        }

        let batched = batch.should_batch(ids.len(), full_catalog);
        let chunk_size = if batched { batch.batch_size } else { ids.len() };
        let chunks: Vec<Vec<String>> = ids.chunks(chunk_size.max(1)).map(<[String]>::to_vec).collect();
        info!(
            "🚀 Collecting {} A items in {} batch(es) (batched={}, parallel={})",
            ids.len(),
            chunks.len(),
            batched,
            batch.max_parallel_batches
        );

        let fetch_started = Instant::now();
        let ranked = BarcodeResolver.fetch(self.source.as_ref(), &BFilter::all()).await?;
        run_stats.record_stage(PipelineStage::FetchB, fetch_started.elapsed());
        let index = BarcodeIndex::build(ranked.records);
        debug!("B index holds {} records over {} barcodes", index.len(), index.distinct_barcodes());

        // Phase 1: fetch, normalize and probe each batch
        let outcomes = self.probe_batches(chunks, &index, batch.max_parallel_batches, cancel).await;

        let mut probed = Vec::new();
        let mut parts: Vec<(usize, CollectionResult)> = Vec::new();
        let mut first_error = None;
        let attempted = outcomes.len();
        let mut failed = 0usize;

        for outcome in outcomes {
            match outcome {
                BatchOutcome::Probed(probed_batch) => probed.push(probed_batch),
                BatchOutcome::Failed { index, ids, error } => {
                    failed += 1;
                    warn!("⚠️ Batch {} failed ({} ids reported unmatched): {}", index, ids.len(), error);
                    parts.push((index, failed_part(index, ids, &error)));
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                BatchOutcome::Skipped { index, ids } => parts.push((index, skipped_part(ids))),
            }
        }

        if failed == attempted {
            if let Some(error) = first_error {
                return Err(LinkError::StorageUnavailable(error));
            }
        }

        // Phase 2: resolve against the maxima of the whole input
        let mut maxima = VendorMaxima::default();
        for probed_batch in &mut probed {
            maxima.merge(std::mem::take(&mut probed_batch.maxima));
        }

        let resolve = |probed_batch: ProbedBatch| {
            let mut stats = probed_batch.stats;
            let links = resolve_stage(probed_batch.candidates, &maxima, &mut stats);
            (probed_batch.index, report(&probed_batch.ids, links, stats))
        };
        let resolved: Vec<(usize, CollectionResult)> = if batch.max_parallel_batches > 1 {
            probed.into_par_iter().map(resolve).collect()
        } else {
            probed.into_iter().map(resolve).collect()
        };
        parts.extend(resolved);
        parts.sort_by_key(|(index, _)| *index);

        let mut result = CollectionResult::merge(parts.into_iter().map(|(_, part)| part));
        let mut stats = run_stats;
        stats.merge(std::mem::take(&mut result.stats));
        stats.set_elapsed(started.elapsed());
        result.stats = stats;

        if result.stats.cancelled {
            warn!("🛑 Collection cancelled, {} ids skipped", result.stats.skipped_ids);
        }
        info!(
            "✅ Collection finished: {} matched, {} unmatched, {} ambiguous, {} failed batch(es) in {:.1}ms",
            result.matched_ids.len(),
            result.unmatched_ids.len(),
            result.ambiguous_mappings.len(),
            result.stats.failed_batches,
            result.stats.elapsed_ms
        );
        Ok(result)
    }

    async fn probe_batches(
        &self,
        chunks: Vec<Vec<String>>,
        index: &BarcodeIndex,
        parallelism: usize,
        cancel: &CancellationToken,
    ) -> Vec<BatchOutcome> {
        let source = self.source.as_ref();
        let normalizer = self.normalizer;

        stream::iter(chunks.into_iter().enumerate())
            .map(move |(batch_index, ids)| async move {
                if cancel.is_cancelled() {
                    return BatchOutcome::Skipped { index: batch_index, ids };
                }

                let mut stats = Stats { total_processed: ids.len() as u64, batches_total: 1, ..Stats::default() };
                let fetch_started = Instant::now();
                let fetched = normalizer.fetch(source, Some(ids.as_slice())).await;
                let normalized = match fetched {
                    Ok(normalized) => normalized,
                    Err(error) => return BatchOutcome::Failed { index: batch_index, ids, error },
                };
                stats.record_stage(PipelineStage::Normalize, fetch_started.elapsed());
                stats.items_with_barcodes = normalized.items_with_barcodes as u64;

                let candidates = probe_stage(&normalized.records, index, &mut stats);
                let maxima = VendorMaxima::from_candidates(&candidates);
                debug!(
                    "Batch {}: {} ids, {} A records, {} candidates",
                    batch_index,
                    ids.len(),
                    normalized.records.len(),
                    candidates.len()
                );
                BatchOutcome::Probed(ProbedBatch { index: batch_index, ids, candidates, maxima, stats })
            })
            .buffered(parallelism.max(1))
            .collect()
            .await
    }
}

fn failed_part(index: usize, ids: Vec<String>, error: &StorageError) -> CollectionResult {
    let stats = Stats {
        total_processed: ids.len() as u64,
        batches_total: 1,
        failed_batches: 1,
        warnings: vec![format!("batch {} failed, {} ids reported unmatched: {}", index, ids.len(), error)],
        ..Stats::default()
    };
    let mut part = CollectionResult::empty(stats);
    part.unmatched_ids = ids;
    part
}

fn skipped_part(ids: Vec<String>) -> CollectionResult {
    CollectionResult::empty(Stats {
        batches_total: 1,
        cancelled: true,
        skipped_ids: ids.len() as u64,
        ..Stats::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory_catalog::InMemoryCatalog;

    fn catalog() -> Arc<InMemoryCatalog> {
        let catalog = InMemoryCatalog::new();
        catalog.add_a_item("1001", Some("111;222;333")).unwrap();
        catalog.add_a_item("2002", Some("555")).unwrap();
        catalog.add_a_item("3003", Some("777")).unwrap();
        catalog.add_b_product("50", "V1", None).unwrap();
        catalog.add_b_product("51", "V2", None).unwrap();
        catalog.add_b_product("60", "V3", None).unwrap();
        catalog.append_b_barcode("50", "222").unwrap();
        catalog.append_b_barcode("50", "999").unwrap();
        catalog.append_b_barcode("51", "555").unwrap();
        catalog.append_b_barcode("60", "555").unwrap();
        Arc::new(catalog)
    }

    fn orchestrator(source: Arc<InMemoryCatalog>) -> BatchOrchestrator {
        BatchOrchestrator::new(source, BarcodeNormalizer::new(';'), true)
    }

    fn forced(batch_size: usize) -> BatchConfig {
        BatchConfig { batch_size, force_batching: true, ..BatchConfig::default() }
    }

    #[tokio::test]
    async fn full_catalog_run_reports_all_outcomes() {
        let result = orchestrator(catalog())
            .run(CatalogScope::All, &BatchConfig::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_matched("1001"));
        assert!(result.is_matched("2002"));
        assert_eq!(result.unmatched_ids, vec!["3003"]);
        assert_eq!(result.counterparts_of("2002"), vec!["V2", "V3"]);
        assert_eq!(result.stats.batches_total, 1);
        assert_eq!(result.stats.total_processed, 3);
    }

    #[tokio::test]
    async fn batch_size_does_not_change_result() {
        let cancel = CancellationToken::new();
        let whole = orchestrator(catalog()).run(CatalogScope::All, &forced(100), &cancel).await.unwrap();
        let single = orchestrator(catalog()).run(CatalogScope::All, &forced(1), &cancel).await.unwrap();

        assert_eq!(whole.matched_ids, single.matched_ids);
        assert_eq!(whole.unmatched_ids, single.unmatched_ids);
        assert_eq!(whole.ambiguous_mappings, single.ambiguous_mappings);
        assert_eq!(single.stats.batches_total, 3);
    }

    #[tokio::test]
    async fn invalid_ids_are_dropped_with_warning() {
        let scope = CatalogScope::explicit(&["1001", "abc", " "]);
        let result = orchestrator(catalog())
            .run(scope, &BatchConfig::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_matched("1001"));
        assert_eq!(result.stats.invalid_input_count, 2);
        assert_eq!(result.stats.warnings.len(), 2);
        assert!(!result.stats.no_valid_input);
    }

    #[tokio::test]
    async fn no_valid_ids_yields_empty_result() {
        let source = catalog();
        source.set_offline(true).unwrap();
        let result = orchestrator(source)
            .run(CatalogScope::explicit(&["x"]), &BatchConfig::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.stats.no_valid_input);
        assert!(result.matched_ids.is_empty());
    }

    #[tokio::test]
    async fn failed_batch_is_reported_unmatched() {
        let source = catalog();
        source.fail_a_reads_for("2002").unwrap();
        let result = orchestrator(source)
            .run(CatalogScope::All, &forced(1), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_matched("1001"));
        assert_eq!(result.unmatched_ids, vec!["2002", "3003"]);
        assert_eq!(result.stats.failed_batches, 1);
        assert!(result.stats.warnings.iter().any(|w| w.contains("batch 1 failed")));
    }

    #[tokio::test]
    async fn every_batch_failing_is_fatal() {
        let source = catalog();
        source.fail_a_reads_for("1001").unwrap();
        let err = orchestrator(source)
            .run(CatalogScope::explicit(&["1001"]), &BatchConfig::default(), &CancellationToken::new())
            .await;
        assert!(matches!(err, Err(LinkError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn unreachable_store_is_fatal() {
        let source = catalog();
        source.set_offline(true).unwrap();
        let err = orchestrator(source)
            .run(CatalogScope::All, &BatchConfig::default(), &CancellationToken::new())
            .await;
        assert!(matches!(err, Err(LinkError::StorageUnavailable(StorageError::Unavailable { .. }))));
    }

    #[tokio::test]
    async fn cancelled_run_skips_remaining_batches() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = orchestrator(catalog()).run(CatalogScope::All, &forced(2), &cancel).await.unwrap();

        assert!(result.stats.cancelled);
        assert_eq!(result.stats.skipped_ids, 3);
        assert!(result.matched_ids.is_empty());
        assert!(result.unmatched_ids.is_empty());
    }

    #[tokio::test]
    async fn parallel_batches_match_sequential() {
        let cancel = CancellationToken::new();
        let sequential = orchestrator(catalog()).run(CatalogScope::All, &forced(1), &cancel).await.unwrap();
        let parallel = BatchConfig { max_parallel_batches: 3, ..forced(1) };
        let parallel = orchestrator(catalog()).run(CatalogScope::All, &parallel, &cancel).await.unwrap();

        assert_eq!(sequential.matched_ids, parallel.matched_ids);
        assert_eq!(sequential.unmatched_ids, parallel.unmatched_ids);
        assert_eq!(sequential.ambiguous_mappings, parallel.ambiguous_mappings);
    }
}
