//! Item ID list validation
//!
//! Callers hand the engine free-form ID lists (pasted from the dashboard,
//! exported from files). Invalid entries are dropped with a warning and the
//! call continues with whatever is left.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

static NUMERIC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("static numeric id pattern"));

/// Why an input ID was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Empty,
    NotNumeric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedId {
    pub raw: String,
    pub reason: RejectReason,
}

/// Outcome of validating one ID list.
///
/// `ids` keeps first-seen order with duplicates removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedIds {
    pub ids: Vec<String>,
    pub rejected: Vec<RejectedId>,
}

impl ValidatedIds {
    /// True when the caller supplied entries but none survived validation
    pub fn no_valid_input(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.rejected
            .iter()
            .map(|r| match r.reason {
                RejectReason::Empty => "dropped empty id".to_string(),
                RejectReason::NotNumeric => format!("dropped non-numeric id '{}'", r.raw),
            })
            .collect()
    }
}

/// Validate and normalize a caller-supplied ID list
pub fn validate_ids<S: AsRef<str>>(raw_ids: &[S], require_numeric: bool) -> ValidatedIds {
    let mut seen = HashSet::with_capacity(raw_ids.len());
    let mut result = ValidatedIds::default();

    for raw in raw_ids {
        let raw = raw.as_ref();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            result.rejected.push(RejectedId { raw: raw.to_string(), reason: RejectReason::Empty });
            continue;
        }
        if require_numeric && !NUMERIC_ID.is_match(trimmed) {
            result.rejected.push(RejectedId { raw: raw.to_string(), reason: RejectReason::NotNumeric });
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            result.ids.push(trimmed.to_string());
        }
    }

    if !result.rejected.is_empty() {
        warn!(
            "Dropped {} invalid id(s) out of {}, continuing with {}",
            result.rejected.len(),
            raw_ids.len(),
            result.ids.len()
        );
    }
    result
}
