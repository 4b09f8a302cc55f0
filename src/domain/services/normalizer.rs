//! Barcode normalization for Marketplace A and ranking for Marketplace B

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::domain::barcode::{clean_barcode, ABarcodeField, BBarcodeRecord, BLogEntry, BarcodeRecord};
use crate::domain::repositories::{BFilter, BarcodeSource, StorageError};

/// Normalized A side of one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedA {
    pub records: Vec<BarcodeRecord>,
    /// Distinct A items that produced at least one record
    pub items_with_barcodes: usize,
    pub no_valid_input: bool,
}

/// Ranked B side of one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankedB {
    pub records: Vec<BBarcodeRecord>,
    pub no_valid_input: bool,
}

/// Expands Marketplace A's delimited barcode field
#[derive(Debug, Clone, Copy)]
pub struct BarcodeNormalizer {
    delimiter: char,
}

impl BarcodeNormalizer {
    pub const fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Split every field into records.
    ///
    /// Positions are 1-based indexes into the original token list, so blank
    /// tokens leave gaps instead of renumbering the survivors. A barcode
    /// repeated within one item keeps its first position. Item IDs are kept
    /// exactly as stored so reports key on the same value the catalog lists.
    pub fn normalize(&self, fields: &[ABarcodeField]) -> NormalizedA {
        let mut records = Vec::new();
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        let mut items: HashSet<&str> = HashSet::new();

        for field in fields {
            let a_id = field.a_id.as_str();
            if a_id.trim().is_empty() {
                continue;
            }
            for (index, token) in field.raw_barcodes.split(self.delimiter).enumerate() {
                let Some(barcode) = clean_barcode(token) else { continue };
                if !seen.insert((a_id, barcode)) {
                    continue;
                }
                items.insert(a_id);
                let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
                records.push(BarcodeRecord::new(a_id, barcode, position));
            }
        }

        NormalizedA { items_with_barcodes: items.len(), records, no_valid_input: false }
    }

    /// Read A fields from storage and normalize them.
    ///
    /// `Some(&[])` means the caller's list had no valid IDs: nothing is read
    /// and the result is flagged instead.
    pub async fn fetch(
        &self,
        source: &dyn BarcodeSource,
        filter: Option<&[String]>,
    ) -> Result<NormalizedA, StorageError> {
        if filter.is_some_and(<[String]>::is_empty) {
            return Ok(NormalizedA { no_valid_input: true, ..NormalizedA::default() });
        }
        let fields = source.a_barcode_fields(filter).await?;
        let normalized = self.normalize(&fields);
        debug!(
            "Normalized {} A fields into {} barcode records",
            fields.len(),
            normalized.records.len()
        );
        Ok(normalized)
    }
}

/// Ranks Marketplace B's barcode log per vendor code
#[derive(Debug, Clone, Copy, Default)]
pub struct BarcodeResolver;

impl BarcodeResolver {
    /// Assign per-vendor insertion ranks and apply `filter`.
    ///
    /// The Nth non-blank barcode inserted for a vendor code gets position N,
    /// whatever other vendors inserted in between. When a vendor re-inserts a
    /// barcode it already had, the later insertion wins.
    pub fn rank(&self, mut entries: Vec<BLogEntry>, filter: &BFilter) -> Vec<BBarcodeRecord> {
        entries.sort_by_key(|e| e.seq);

        let mut next_rank: HashMap<String, u32> = HashMap::new();
        let mut slots: HashMap<(String, String), usize> = HashMap::new();
        let mut ranked: Vec<BBarcodeRecord> = Vec::with_capacity(entries.len());

        for entry in entries {
            let Some(barcode) = clean_barcode(&entry.barcode).map(str::to_string) else { continue };
            let rank = next_rank.entry(entry.vendor_code.clone()).or_insert(0);
            *rank += 1;
            let record = BBarcodeRecord {
                b_id: entry.b_id,
                vendor_code: entry.vendor_code,
                internal_id: entry.internal_id,
                barcode,
                position: *rank,
            };
            let key = (record.vendor_code.clone(), record.barcode.clone());
            if let Some(&slot) = slots.get(&key) {
                ranked[slot] = record;
            } else {
                slots.insert(key, ranked.len());
                ranked.push(record);
            }
        }

        ranked.retain(|r| filter.accepts(&r.b_id, &r.vendor_code, r.internal_id.as_deref()));
        ranked.sort_by(|l, r| l.vendor_code.cmp(&r.vendor_code).then(l.position.cmp(&r.position)));
        ranked
    }

    pub async fn fetch(&self, source: &dyn BarcodeSource, filter: &BFilter) -> Result<RankedB, StorageError> {
        let empty_list = [&filter.b_ids, &filter.vendor_codes, &filter.internal_ids]
            .into_iter()
            .any(|list| list.as_ref().is_some_and(Vec::is_empty));
        if empty_list {
            return Ok(RankedB { records: Vec::new(), no_valid_input: true });
        }
        let log = source.b_barcode_log(filter).await?;
        let log_len = log.len();
        let records = self.rank(log, filter);
        debug!("Ranked {} B log rows into {} barcode records", log_len, records.len());
        Ok(RankedB { records, no_valid_input: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn entry(seq: i64, b_id: &str, vendor: &str, barcode: &str) -> BLogEntry {
        BLogEntry {
            seq,
            b_id: b_id.into(),
            vendor_code: vendor.into(),
            internal_id: None,
            barcode: barcode.into(),
        }
    }

    #[rstest]
    #[case("111;222;333", &[("111", 1), ("222", 2), ("333", 3)])]
    #[case(" 111 ; ;333", &[("111", 1), ("333", 3)])]
    #[case(";;444", &[("444", 3)])]
    #[case("555;555", &[("555", 1)])]
    #[case("  ", &[])]
    fn splits_field_keeping_original_positions(#[case] raw: &str, #[case] expected: &[(&str, u32)]) {
        let normalizer = BarcodeNormalizer::new(';');
        let result = normalizer.normalize(&[ABarcodeField::new("1001", raw)]);
        let got: Vec<(&str, u32)> = result.records.iter().map(|r| (r.barcode.as_str(), r.position)).collect();
        assert_eq!(got, expected);
        assert_eq!(result.items_with_barcodes, usize::from(!expected.is_empty()));
    }

    #[test]
    fn honours_custom_delimiter() {
        let normalizer = BarcodeNormalizer::new(',');
        let result = normalizer.normalize(&[ABarcodeField::new("1", "7,8;9")]);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[1].barcode, "8;9");
    }

    #[test]
    fn item_id_is_kept_as_stored() {
        let normalizer = BarcodeNormalizer::new(';');
        let result = normalizer.normalize(&[ABarcodeField::new("1001 ", "222"), ABarcodeField::new("  ", "333")]);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].owner_id, "1001 ");
        assert_eq!(result.items_with_barcodes, 1);
    }

    proptest! {
        #[test]
        fn survivors_keep_token_order_and_index(
            tokens in prop::collection::vec(prop_oneof!["[0-9]{1,3}", " {0,2}", " [0-9]{1,2} "], 0..12),
        ) {
            let result = BarcodeNormalizer::new(';').normalize(&[ABarcodeField::new("7", tokens.join(";"))]);

            let mut seen = HashSet::new();
            let expected: Vec<(String, u32)> = tokens
                .iter()
                .enumerate()
                .filter_map(|(i, t)| clean_barcode(t).map(|b| (b.to_string(), i as u32 + 1)))
                .filter(|(b, _)| seen.insert(b.clone()))
                .collect();
            let got: Vec<(String, u32)> = result.records.iter().map(|r| (r.barcode.clone(), r.position)).collect();
            prop_assert_eq!(got, expected);
        }
    }

    #[test]
    fn ranks_are_scoped_per_vendor() {
        let log = vec![
            entry(1, "10", "V1", "222"),
            entry(2, "20", "V2", "aaa"),
            entry(3, "10", "V1", "999"),
            entry(4, "20", "V2", "bbb"),
        ];
        let ranked = BarcodeResolver.rank(log, &BFilter::all());
        let v1: Vec<(&str, u32)> = ranked
            .iter()
            .filter(|r| r.vendor_code == "V1")
            .map(|r| (r.barcode.as_str(), r.position))
            .collect();
        assert_eq!(v1, vec![("222", 1), ("999", 2)]);
    }

    #[test]
    fn reinserted_barcode_takes_latest_rank() {
        let log = vec![entry(1, "10", "V1", "222"), entry(2, "10", "V1", "333"), entry(3, "10", "V1", "222")];
        let ranked = BarcodeResolver.rank(log, &BFilter::all());
        let got: Vec<(&str, u32)> = ranked.iter().map(|r| (r.barcode.as_str(), r.position)).collect();
        assert_eq!(got, vec![("333", 2), ("222", 3)]);
    }

    #[test]
    fn filter_does_not_change_ranks() {
        let log = vec![entry(1, "10", "V1", "111"), entry(2, "11", "V1", "222")];
        let ranked = BarcodeResolver.rank(log, &BFilter::by_ids(vec!["11".into()]));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].position, 2);
    }

    #[test]
    fn blank_log_rows_are_skipped_before_ranking() {
        let log = vec![entry(1, "10", "V1", "  "), entry(2, "10", "V1", "222")];
        let ranked = BarcodeResolver.rank(log, &BFilter::all());
        assert_eq!(ranked[0].position, 1);
    }
}
