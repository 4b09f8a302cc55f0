//! Collection result model and run statistics
//!
//! A [`CollectionResult`] is built once per top-level collection call and is
//! never mutated after it is returned. Partial results of independent
//! batches are combined with [`CollectionResult::merge`], whose operations
//! (set union, concatenation, counter summation) are commutative and
//! associative up to ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;
use uuid::Uuid;

/// One item linked to more than one counterpart through the same actual barcode
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AmbiguousMapping {
    pub id: String,
    /// Sorted counterpart vendor codes
    pub counterparts: Vec<String>,
    pub matching_barcode: String,
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    FetchA,
    FetchB,
    Normalize,
    Match,
    ActualBarcode,
    PrimaryLink,
    Dedup,
    Report,
}

impl PipelineStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FetchA => "fetch_a",
            Self::FetchB => "fetch_b",
            Self::Normalize => "normalize",
            Self::Match => "match",
            Self::ActualBarcode => "actual_barcode",
            Self::PrimaryLink => "primary_link",
            Self::Dedup => "dedup",
            Self::Report => "report",
        }
    }
}

/// Diagnostic counters. Nothing in the engine reads these back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_processed: u64,
    pub items_with_barcodes: u64,
    pub raw_candidate_count: u64,
    pub unique_result_count: u64,
    pub ambiguous_count: u64,
    /// Candidates whose (A item, vendor code) pair has no actual B barcode
    pub stale_link_count: u64,
    pub invalid_input_count: u64,
    pub no_valid_input: bool,
    pub batches_total: u32,
    pub failed_batches: u32,
    pub cancelled: bool,
    pub skipped_ids: u64,
    pub elapsed_ms: f64,
    pub stage_timings_ms: BTreeMap<PipelineStage, f64>,
    pub warnings: Vec<String>,
}

impl Stats {
    pub fn record_stage(&mut self, stage: PipelineStage, elapsed: Duration) {
        *self.stage_timings_ms.entry(stage).or_insert(0.0) += elapsed.as_secs_f64() * 1000.0;
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    }

    /// Field-wise summation; flags are OR-ed, warnings concatenated
    pub fn merge(&mut self, other: Self) {
        self.total_processed += other.total_processed;
        self.items_with_barcodes += other.items_with_barcodes;
        self.raw_candidate_count += other.raw_candidate_count;
        self.unique_result_count += other.unique_result_count;
        self.ambiguous_count += other.ambiguous_count;
        self.stale_link_count += other.stale_link_count;
        self.invalid_input_count += other.invalid_input_count;
        self.no_valid_input |= other.no_valid_input;
        self.batches_total += other.batches_total;
        self.failed_batches += other.failed_batches;
        self.cancelled |= other.cancelled;
        self.skipped_ids += other.skipped_ids;
        self.elapsed_ms += other.elapsed_ms;
        for (stage, ms) in other.stage_timings_ms {
            *self.stage_timings_ms.entry(stage).or_insert(0.0) += ms;
        }
        self.warnings.extend(other.warnings);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResult {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub matched_ids: BTreeSet<String>,
    pub unmatched_ids: Vec<String>,
    pub ambiguous_mappings: Vec<AmbiguousMapping>,
    pub stats: Stats,
}

impl CollectionResult {
    pub fn empty(stats: Stats) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            matched_ids: BTreeSet::new(),
            unmatched_ids: Vec::new(),
            ambiguous_mappings: Vec::new(),
            stats,
        }
    }

    /// Combine partial results of independent batches.
    ///
    /// Unmatched IDs are concatenated, then anything matched by any part is
    /// removed and duplicates dropped (first occurrence wins).
    pub fn merge(parts: impl IntoIterator<Item = Self>) -> Self {
        let mut merged = Self::empty(Stats::default());
        let mut unmatched = Vec::new();

        for part in parts {
            merged.matched_ids.extend(part.matched_ids);
            unmatched.extend(part.unmatched_ids);
            merged.ambiguous_mappings.extend(part.ambiguous_mappings);
            merged.stats.merge(part.stats);
        }

        let mut seen = HashSet::with_capacity(unmatched.len());
        merged.unmatched_ids = unmatched
            .into_iter()
            .filter(|id| !merged.matched_ids.contains(id) && seen.insert(id.clone()))
            .collect();
        merged
    }

    pub fn is_matched(&self, id: &str) -> bool {
        self.matched_ids.contains(id)
    }

    /// Ambiguous counterparts reported for `id`, across all its barcodes
    pub fn counterparts_of(&self, id: &str) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .ambiguous_mappings
            .iter()
            .filter(|m| m.id == id)
            .flat_map(|m| m.counterparts.iter().map(String::as_str))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}
