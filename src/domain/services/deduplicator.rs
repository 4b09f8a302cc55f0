//! Collapse resolved links into a canonical link table
//!
//! Within each group the primary row wins; otherwise the first row seen is
//! kept. Groups come out in order of first appearance.

use std::collections::HashMap;

use crate::domain::link::{DedupMode, LinkDirection, ResolvedLink};

/// Grouping used to collapse links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupKey {
    /// One row per queried item (`a_id` for A→B, `b_id` for B→A)
    Source(LinkDirection),
    /// One row per `(a_id, b_vendor_code)`
    AVendorPair,
    /// One row per `(a_id, b_id)`
    ABPair,
}

impl DedupKey {
    pub const fn for_mode(mode: DedupMode, direction: LinkDirection) -> Self {
        match mode {
            DedupMode::BestMatch => Self::Source(direction),
            DedupMode::PreserveMultiplicity => Self::AVendorPair,
        }
    }

    fn group_of<'a>(&self, link: &'a ResolvedLink) -> (&'a str, &'a str) {
        let c = &link.candidate;
        match self {
            Self::Source(LinkDirection::AToB) => (c.a_id.as_str(), ""),
            Self::Source(LinkDirection::BToA) => (c.b_id.as_str(), ""),
            Self::AVendorPair => (c.a_id.as_str(), c.b_vendor_code.as_str()),
            Self::ABPair => (c.a_id.as_str(), c.b_id.as_str()),
        }
    }
}

pub fn dedup(links: Vec<ResolvedLink>, key: DedupKey) -> Vec<ResolvedLink> {
    let mut slots: HashMap<(String, String), usize> = HashMap::with_capacity(links.len());
    let mut kept: Vec<ResolvedLink> = Vec::new();

    for link in links {
        let (left, right) = key.group_of(&link);
        let group = (left.to_string(), right.to_string());
        match slots.get(&group) {
            Some(&slot) => {
                if link.is_primary && !kept[slot].is_primary {
                    kept[slot] = link;
                }
            }
            None => {
                slots.insert(group, kept.len());
                kept.push(link);
            }
        }
    }
    kept
}
