//! Actual-barcode resolution for Marketplace B
//!
//! A B vendor code's "actual" barcode is the one with the highest insertion
//! rank *among the barcodes that matched something*. A later barcode that
//! matched nothing does not demote the matched ones.

use std::collections::HashMap;

use crate::domain::link::{LinkCandidate, ResolvedLink};

/// Highest matched `b_position` per vendor code
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorMaxima(HashMap<String, u32>);

impl VendorMaxima {
    pub fn from_candidates(candidates: &[LinkCandidate]) -> Self {
        let mut maxima = Self::default();
        for c in candidates {
            maxima.observe(&c.b_vendor_code, c.b_position);
        }
        maxima
    }

    fn observe(&mut self, vendor_code: &str, position: u32) {
        match self.0.get_mut(vendor_code) {
            Some(max) => *max = (*max).max(position),
            None => {
                self.0.insert(vendor_code.to_string(), position);
            }
        }
    }

    /// Fold in maxima computed over another slice of the same run
    pub fn merge(&mut self, other: Self) {
        for (vendor_code, position) in other.0 {
            self.observe(&vendor_code, position);
        }
    }

    pub fn get(&self, vendor_code: &str) -> Option<u32> {
        self.0.get(vendor_code).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Flag candidates that carry their vendor's actual barcode.
///
/// `maxima` must cover at least the given candidates; a batch resolves
/// against the maxima of the whole run. `is_primary` starts out false.
pub fn mark_actual(candidates: Vec<LinkCandidate>, maxima: &VendorMaxima) -> Vec<ResolvedLink> {
    candidates
        .into_iter()
        .map(|candidate| {
            let is_actual_b_barcode = maxima.get(&candidate.b_vendor_code) == Some(candidate.b_position);
            ResolvedLink { candidate, is_actual_b_barcode, is_primary: false }
        })
        .collect()
}
