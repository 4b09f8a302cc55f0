//! Barcode matcher: hash join of A barcodes against B barcodes
//!
//! Builds a `barcode -> rows` index over one side and probes it with the
//! other, so a run costs O(N + M + K) for N A records, M B records and K
//! emitted candidates.

use std::collections::HashMap;
use std::hash::Hash;

use crate::domain::barcode::{clean_barcode, BBarcodeRecord, BarcodeRecord};
use crate::domain::link::LinkCandidate;

/// Which side the hash index is built over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSide {
    A,
    B,
    /// Index the smaller side
    Auto,
}

/// Index-pairs `(left, right)` of equal keys. Keys mapped to `None` never match.
pub fn hash_join<L, R, K>(
    left: &[L],
    right: &[R],
    left_key: impl Fn(&L) -> Option<K>,
    right_key: impl Fn(&R) -> Option<K>,
) -> Vec<(usize, usize)>
where
    K: Eq + Hash,
{
    let mut index: HashMap<K, Vec<usize>> = HashMap::with_capacity(left.len());
    for (i, row) in left.iter().enumerate() {
        if let Some(key) = left_key(row) {
            index.entry(key).or_default().push(i);
        }
    }

    let mut pairs = Vec::new();
    for (j, row) in right.iter().enumerate() {
        let Some(key) = right_key(row) else { continue };
        if let Some(hits) = index.get(&key) {
            pairs.extend(hits.iter().map(|&i| (i, j)));
        }
    }
    pairs
}

fn candidate(a: &BarcodeRecord, b: &BBarcodeRecord, barcode: &str) -> LinkCandidate {
    LinkCandidate {
        a_id: a.owner_id.clone(),
        b_vendor_code: b.vendor_code.clone(),
        b_id: b.b_id.clone(),
        barcode: barcode.to_string(),
        a_position: a.position,
        b_position: b.position,
        b_internal_id: b.internal_id.clone(),
    }
}

fn finish(mut candidates: Vec<LinkCandidate>) -> Vec<LinkCandidate> {
    candidates.sort_unstable();
    candidates.dedup();
    candidates
}

/// Join A and B records on their trimmed barcode.
///
/// Output is sorted and free of exact duplicates, so it does not depend on
/// the build side or on input order.
pub fn match_barcodes_with(a: &[BarcodeRecord], b: &[BBarcodeRecord], side: BuildSide) -> Vec<LinkCandidate> {
    let a_key = |r: &BarcodeRecord| clean_barcode(&r.barcode).map(str::to_string);
    let b_key = |r: &BBarcodeRecord| clean_barcode(&r.barcode).map(str::to_string);

    let build_on_a = match side {
        BuildSide::A => true,
        BuildSide::B => false,
        BuildSide::Auto => a.len() <= b.len(),
    };

    let candidates = if build_on_a {
        hash_join(a, b, a_key, b_key)
            .into_iter()
            .map(|(i, j)| candidate(&a[i], &b[j], b[j].barcode.trim()))
            .collect()
    } else {
        hash_join(b, a, b_key, a_key)
            .into_iter()
            .map(|(j, i)| candidate(&a[i], &b[j], b[j].barcode.trim()))
            .collect()
    };
    finish(candidates)
}

pub fn match_barcodes(a: &[BarcodeRecord], b: &[BBarcodeRecord]) -> Vec<LinkCandidate> {
    match_barcodes_with(a, b, BuildSide::Auto)
}

/// Prebuilt index over the B catalog, probed once per A batch.
///
/// Building it once per collection run keeps batched runs linear in the B
/// catalog size instead of re-indexing it for every batch.
#[derive(Debug, Clone, Default)]
pub struct BarcodeIndex {
    records: Vec<BBarcodeRecord>,
    by_barcode: HashMap<String, Vec<usize>>,
}

impl BarcodeIndex {
    pub fn build(records: Vec<BBarcodeRecord>) -> Self {
        let mut by_barcode: HashMap<String, Vec<usize>> = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if let Some(barcode) = clean_barcode(&record.barcode) {
                by_barcode.entry(barcode.to_string()).or_default().push(i);
            }
        }
        Self { records, by_barcode }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn distinct_barcodes(&self) -> usize {
        self.by_barcode.len()
    }

    /// Same output as [`match_barcodes`] against the indexed records
    pub fn probe(&self, a: &[BarcodeRecord]) -> Vec<LinkCandidate> {
        let mut candidates = Vec::new();
        for a_record in a {
            let Some(barcode) = clean_barcode(&a_record.barcode) else { continue };
            if let Some(hits) = self.by_barcode.get(barcode) {
                candidates.extend(hits.iter().map(|&j| candidate(a_record, &self.records[j], barcode)));
            }
        }
        finish(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn b(b_id: &str, vendor: &str, barcode: &str, position: u32) -> BBarcodeRecord {
        BBarcodeRecord {
            b_id: b_id.into(),
            vendor_code: vendor.into(),
            internal_id: None,
            barcode: barcode.into(),
            position,
        }
    }

    #[test]
    fn emits_one_candidate_per_shared_barcode() {
        let a = vec![
            BarcodeRecord::new("1001", "111", 1),
            BarcodeRecord::new("1001", "222", 2),
            BarcodeRecord::new("1001", "333", 3),
        ];
        let b_side = vec![b("50", "V1", "222", 1), b("50", "V1", "999", 2)];

        let candidates = match_barcodes(&a, &b_side);
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!((c.a_id.as_str(), c.b_vendor_code.as_str(), c.barcode.as_str()), ("1001", "V1", "222"));
        assert_eq!((c.a_position, c.b_position), (2, 1));
    }

    #[test]
    fn blank_barcodes_never_match() {
        let a = vec![BarcodeRecord::new("1", "  ", 1)];
        let b_side = vec![b("50", "V1", "", 1)];
        assert!(match_barcodes(&a, &b_side).is_empty());
    }

    #[test]
    fn matches_on_trimmed_value() {
        let a = vec![BarcodeRecord::new("1", " 555 ", 1)];
        let b_side = vec![b("50", "V1", "555", 1)];
        assert_eq!(match_barcodes(&a, &b_side)[0].barcode, "555");
    }

    #[test]
    fn prebuilt_index_agrees_with_one_off_join() {
        let a = vec![BarcodeRecord::new("1", "555", 1), BarcodeRecord::new("2", "555", 1)];
        let b_side = vec![b("50", "V2", "555", 1), b("60", "V3", "555", 4)];
        let index = BarcodeIndex::build(b_side.clone());
        assert_eq!(index.probe(&a), match_barcodes(&a, &b_side));
        assert_eq!(index.distinct_barcodes(), 1);
    }

    proptest! {
        #[test]
        fn join_is_commutative(
            left in prop::collection::vec("[a-c]{0,2}", 0..20),
            right in prop::collection::vec("[a-c]{0,2}", 0..20),
        ) {
            let key = |s: &String| clean_barcode(s).map(str::to_string);
            let forward: BTreeSet<(usize, usize)> = hash_join(&left, &right, key, key).into_iter().collect();
            let backward: BTreeSet<(usize, usize)> = hash_join(&right, &left, key, key)
                .into_iter()
                .map(|(j, i)| (i, j))
                .collect();
            prop_assert_eq!(forward, backward);
        }

        #[test]
        fn build_side_does_not_change_candidates(
            a_codes in prop::collection::vec(("[0-9]{1,2}", "[a-d]"), 0..25),
            b_codes in prop::collection::vec(("[a-d]", "V[1-3]"), 0..25),
        ) {
            let a: Vec<BarcodeRecord> = a_codes.iter().enumerate()
                .map(|(i, (id, code))| BarcodeRecord::new(id.as_str(), code.as_str(), i as u32 + 1))
                .collect();
            let b_side: Vec<BBarcodeRecord> = b_codes.iter().enumerate()
                .map(|(i, (code, vendor))| b(&format!("{i}"), vendor, code, i as u32 + 1))
                .collect();
            let indexed = BarcodeIndex::build(b_side.clone()).probe(&a);
            prop_assert_eq!(
                match_barcodes_with(&a, &b_side, BuildSide::A),
                match_barcodes_with(&a, &b_side, BuildSide::B)
            );
            prop_assert_eq!(indexed, match_barcodes(&a, &b_side));
        }
    }
}
