//! Stage sequencing for one in-memory pipeline run
//!
//! match → actual barcode → primary link → dedup / report. Every stage is
//! a pure transformation over typed rows; timings are accumulated in the
//! caller's [`Stats`].

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Instant;
use tracing::debug;

use crate::domain::barcode::{BBarcodeRecord, BarcodeRecord};
use crate::domain::collection::{AmbiguousMapping, CollectionResult, PipelineStage, Stats};
use crate::domain::link::{LinkCandidate, ResolvedLink};
use crate::domain::services::actual_barcode::{mark_actual, VendorMaxima};
use crate::domain::services::deduplicator::{dedup, DedupKey};
use crate::domain::services::matcher::{match_barcodes, BarcodeIndex};
use crate::domain::services::primary_link::select_primary;

pub fn match_stage(a: &[BarcodeRecord], b: &[BBarcodeRecord], stats: &mut Stats) -> Vec<LinkCandidate> {
    let started = Instant::now();
    let candidates = match_barcodes(a, b);
    stats.record_stage(PipelineStage::Match, started.elapsed());
    stats.raw_candidate_count += candidates.len() as u64;
    candidates
}

pub fn probe_stage(a: &[BarcodeRecord], index: &BarcodeIndex, stats: &mut Stats) -> Vec<LinkCandidate> {
    let started = Instant::now();
    let candidates = index.probe(a);
    stats.record_stage(PipelineStage::Match, started.elapsed());
    stats.raw_candidate_count += candidates.len() as u64;
    candidates
}

/// Actual-barcode and primary-link resolution against the given maxima
pub fn resolve_stage(candidates: Vec<LinkCandidate>, maxima: &VendorMaxima, stats: &mut Stats) -> Vec<ResolvedLink> {
    let started = Instant::now();
    let marked = mark_actual(candidates, maxima);
    stats.record_stage(PipelineStage::ActualBarcode, started.elapsed());

    let started = Instant::now();
    let selection = select_primary(marked);
    stats.record_stage(PipelineStage::PrimaryLink, started.elapsed());
    stats.stale_link_count += selection.stale_links as u64;
    selection.links
}

/// Full pipeline over one self-contained record set
pub fn run(a: &[BarcodeRecord], b: &[BBarcodeRecord], stats: &mut Stats) -> Vec<ResolvedLink> {
    let candidates = match_stage(a, b, stats);
    let maxima = VendorMaxima::from_candidates(&candidates);
    let links = resolve_stage(candidates, &maxima, stats);
    debug!(
        "Pipeline produced {} resolved links ({} primary) for {} vendor codes",
        links.len(),
        links.iter().filter(|l| l.is_primary).count(),
        maxima.len()
    );
    links
}

/// Dedup stage with timing
pub fn dedup_stage(links: Vec<ResolvedLink>, key: DedupKey, stats: &mut Stats) -> Vec<ResolvedLink> {
    let started = Instant::now();
    let out = dedup(links, key);
    stats.record_stage(PipelineStage::Dedup, started.elapsed());
    out
}

/// Items linked to several vendor codes through one barcode, sorted by (id, barcode)
pub fn find_ambiguous(links: &[ResolvedLink]) -> Vec<AmbiguousMapping> {
    let mut groups: BTreeMap<(&str, &str), BTreeSet<&str>> = BTreeMap::new();
    for link in links.iter().filter(|l| l.is_primary) {
        let c = &link.candidate;
        groups
            .entry((c.a_id.as_str(), c.barcode.as_str()))
            .or_default()
            .insert(c.b_vendor_code.as_str());
    }

    groups
        .into_iter()
        .filter(|(_, vendors)| vendors.len() > 1)
        .map(|((id, barcode), vendors)| AmbiguousMapping {
            id: id.to_string(),
            counterparts: vendors.into_iter().map(str::to_string).collect(),
            matching_barcode: barcode.to_string(),
        })
        .collect()
}

/// Build the collection result of one batch.
///
/// An A item counts as matched only through a primary link; items whose
/// candidates are all stale stay unmatched.
pub fn report(a_ids: &[String], links: Vec<ResolvedLink>, mut stats: Stats) -> CollectionResult {
    let primary: Vec<ResolvedLink> = links.into_iter().filter(|l| l.is_primary).collect();
    let unique = dedup_stage(primary, DedupKey::AVendorPair, &mut stats);

    let started = Instant::now();
    let ambiguous_mappings = find_ambiguous(&unique);
    let linked: HashSet<&str> = unique.iter().map(ResolvedLink::a_id).collect();

    let mut result = CollectionResult::empty(Stats::default());
    for id in a_ids {
        if linked.contains(id.as_str()) {
            result.matched_ids.insert(id.clone());
        } else {
            result.unmatched_ids.push(id.clone());
        }
    }
    stats.record_stage(PipelineStage::Report, started.elapsed());
    stats.unique_result_count += unique.len() as u64;
    stats.ambiguous_count += ambiguous_mappings.len() as u64;

    result.ambiguous_mappings = ambiguous_mappings;
    result.stats = stats;
    result
}
