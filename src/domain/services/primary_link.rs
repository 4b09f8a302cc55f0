//! Primary-link selection
//!
//! Within one `(a_id, b_vendor_code)` pair, the primary link is the
//! actual-B candidate with the lowest A position. Pairs without any actual-B
//! candidate have no primary link at all.

use std::collections::HashMap;

use crate::domain::link::ResolvedLink;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimarySelection {
    pub links: Vec<ResolvedLink>,
    /// Candidates in pairs that have no actual-B candidate
    pub stale_links: usize,
}

pub fn select_primary(mut links: Vec<ResolvedLink>) -> PrimarySelection {
    let mut min_a_position: HashMap<(String, String), u32> = HashMap::new();
    for link in links.iter().filter(|l| l.is_actual_b_barcode) {
        let key = (link.candidate.a_id.clone(), link.candidate.b_vendor_code.clone());
        let pos = link.candidate.a_position;
        min_a_position.entry(key).and_modify(|m| *m = (*m).min(pos)).or_insert(pos);
    }

    let mut stale_links = 0;
    for link in &mut links {
        let key = (link.candidate.a_id.clone(), link.candidate.b_vendor_code.clone());
        match min_a_position.get(&key) {
            Some(&min) => link.is_primary = link.is_actual_b_barcode && link.candidate.a_position == min,
            None => {
                link.is_primary = false;
                stale_links += 1;
            }
        }
    }

    PrimarySelection { links, stale_links }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::link::LinkCandidate;

    fn link(a_id: &str, vendor: &str, barcode: &str, a_pos: u32, actual: bool) -> ResolvedLink {
        ResolvedLink {
            candidate: LinkCandidate {
                a_id: a_id.into(),
                b_vendor_code: vendor.into(),
                b_id: format!("b-{vendor}"),
                barcode: barcode.into(),
                a_position: a_pos,
                b_position: 1,
                b_internal_id: None,
            },
            is_actual_b_barcode: actual,
            is_primary: false,
        }
    }

    #[test]
    fn lowest_a_position_among_actual_wins() {
        let selection = select_primary(vec![
            link("1", "V1", "111", 1, false),
            link("1", "V1", "222", 2, true),
            link("1", "V1", "333", 3, true),
        ]);
        let primary: Vec<&str> = selection
            .links
            .iter()
            .filter(|l| l.is_primary)
            .map(|l| l.candidate.barcode.as_str())
            .collect();
        // 111 has the lowest A position but is not B's actual barcode.
        assert_eq!(primary, vec!["222"]);
        assert_eq!(selection.stale_links, 0);
    }

    #[test]
    fn pair_without_actual_candidate_is_stale() {
        let selection = select_primary(vec![link("1", "V1", "111", 1, false), link("2", "V1", "333", 1, true)]);
        assert!(!selection.links[0].is_primary);
        assert!(selection.links[1].is_primary);
        assert_eq!(selection.stale_links, 1);
    }

    #[test]
    fn pairs_are_independent_per_vendor() {
        let selection = select_primary(vec![link("1", "V1", "111", 2, true), link("1", "V2", "222", 1, true)]);
        assert!(selection.links.iter().all(|l| l.is_primary));
    }
}
