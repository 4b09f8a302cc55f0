//! Link rows produced by the matching pipeline

use serde::{Deserialize, Serialize};

/// One barcode-level match between an A item and a B product.
///
/// Not deduplicated: an (A, B) pair sharing three barcodes yields three
/// candidates. Lives only within a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkCandidate {
    pub a_id: String,
    pub b_vendor_code: String,
    pub b_id: String,
    pub barcode: String,
    pub a_position: u32,
    pub b_position: u32,
    pub b_internal_id: Option<String>,
}

/// A candidate after actual-barcode and primary-link resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedLink {
    #[serde(flatten)]
    pub candidate: LinkCandidate,
    pub is_actual_b_barcode: bool,
    pub is_primary: bool,
}

impl ResolvedLink {
    pub fn a_id(&self) -> &str {
        &self.candidate.a_id
    }

    pub fn b_id(&self) -> &str {
        &self.candidate.b_id
    }

    pub fn b_vendor_code(&self) -> &str {
        &self.candidate.b_vendor_code
    }
}

/// Row of the bidirectional link table returned by `get_all_links`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkRow {
    pub a_id: String,
    pub b_id: String,
    pub b_vendor_code: String,
    pub b_internal_id: Option<String>,
    pub matched_barcode: String,
    pub is_primary: bool,
}

impl From<ResolvedLink> for LinkRow {
    fn from(link: ResolvedLink) -> Self {
        let c = link.candidate;
        Self {
            a_id: c.a_id,
            b_id: c.b_id,
            b_vendor_code: c.b_vendor_code,
            b_internal_id: c.b_internal_id,
            matched_barcode: c.barcode,
            is_primary: link.is_primary,
        }
    }
}

/// Which side the caller queried from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
    AToB,
    BToA,
}

/// How resolved links collapse when answering "what relates to X".
///
/// `BestMatch` keeps a single row per queried item. `PreserveMultiplicity`
/// keeps the best row per `(a_id, b_vendor_code)` so one-to-many
/// relationships across vendor codes survive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    BestMatch,
    #[default]
    PreserveMultiplicity,
}

impl std::fmt::Display for DedupMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BestMatch => write!(f, "best_match"),
            Self::PreserveMultiplicity => write!(f, "preserve_multiplicity"),
        }
    }
}
