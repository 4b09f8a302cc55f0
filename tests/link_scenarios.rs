//! End-to-end link scenarios through the public engine API
use std::sync::Arc;

use catalog_linker_lib::application::{CatalogScope, LinkEngine};
use catalog_linker_lib::domain::{AmbiguousMapping, BFilter};
use catalog_linker_lib::infrastructure::config::{BatchConfig, EngineConfig};
use catalog_linker_lib::infrastructure::{DatabaseConnection, InMemoryCatalog, SqliteBarcodeRepository};
use catalog_linker_lib::DedupMode;

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

/// "1001" plain link, "2002" ambiguous between V2 and V3, "3003" unmatched
fn reference_catalog() -> Arc<InMemoryCatalog> {
    let catalog = InMemoryCatalog::new();
    catalog.add_a_item("1001", Some("111;222;333")).unwrap();
    catalog.add_a_item("2002", Some("555")).unwrap();
    catalog.add_a_item("3003", Some("777")).unwrap();
    catalog.add_b_product("50", "V1", Some("9001")).unwrap();
    catalog.add_b_product("51", "V2", None).unwrap();
    catalog.add_b_product("60", "V3", None).unwrap();
    catalog.append_b_barcode("50", "222").unwrap();
    catalog.append_b_barcode("50", "999").unwrap();
    catalog.append_b_barcode("51", "555").unwrap();
    catalog.append_b_barcode("60", "555").unwrap();
    Arc::new(catalog)
}

fn engine(catalog: Arc<InMemoryCatalog>) -> LinkEngine {
    LinkEngine::new(catalog, EngineConfig::default()).unwrap()
}

#[tokio::test]
async fn matched_history_barcode_is_the_primary_link() {
    let rows = engine(reference_catalog()).get_all_links(Some(&ids(&["1001"])[..]), None).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].a_id, "1001");
    assert_eq!(rows[0].b_vendor_code, "V1");
    assert_eq!(rows[0].b_internal_id.as_deref(), Some("9001"));
    assert_eq!(rows[0].matched_barcode, "222");
    assert!(rows[0].is_primary);
}

#[tokio::test]
async fn catalog_collection_reports_ambiguity_and_misses() {
    let result = engine(reference_catalog())
        .collect_for_catalog(CatalogScope::All, &BatchConfig::default())
        .await
        .unwrap();

    assert_eq!(
        result.ambiguous_mappings,
        vec![AmbiguousMapping {
            id: "2002".into(),
            counterparts: vec!["V2".into(), "V3".into()],
            matching_barcode: "555".into(),
        }]
    );
    assert_eq!(result.unmatched_ids, vec!["3003"]);
    assert_eq!(result.matched_ids.iter().collect::<Vec<_>>(), vec!["1001", "2002"]);
    assert_eq!(result.stats.raw_candidate_count, 3);
    assert_eq!(result.stats.items_with_barcodes, 3);
}

#[tokio::test]
async fn later_unmatched_barcode_does_not_demote_matched_one() {
    // V1 lists 222 and later 999; nothing in A carries 999
    let links = engine(reference_catalog()).link_a_to_b(&ids(&["1001"])).await.unwrap();
    assert_eq!(links["1001"], vec!["50"]);
}

#[tokio::test]
async fn stale_barcode_yields_no_primary_link() {
    let catalog = InMemoryCatalog::new();
    catalog.add_a_item("1", Some("111")).unwrap();
    catalog.add_a_item("2", Some("333")).unwrap();
    catalog.add_b_product("70", "V7", None).unwrap();
    catalog.append_b_barcode("70", "111").unwrap();
    catalog.append_b_barcode("70", "333").unwrap();

    let engine = engine(Arc::new(catalog));
    let links = engine.link_a_to_b(&ids(&["1", "2"])).await.unwrap();
    assert!(!links.contains_key("1"));
    assert_eq!(links["2"], vec!["70"]);

    let rows = engine.get_all_links(None, None).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(!rows[0].is_primary);

    let result = engine.collect_for_catalog(CatalogScope::All, &BatchConfig::default()).await.unwrap();
    assert_eq!(result.unmatched_ids, vec!["1"]);
    assert_eq!(result.stats.stale_link_count, 1);
}

#[tokio::test]
async fn dedup_modes_differ_on_one_to_many() {
    let engine = engine(reference_catalog());
    let all = engine.link_a_to_b_with_mode(&ids(&["2002"]), DedupMode::PreserveMultiplicity).await.unwrap();
    let best = engine.link_a_to_b_with_mode(&ids(&["2002"]), DedupMode::BestMatch).await.unwrap();

    assert_eq!(all["2002"], vec!["51", "60"]);
    assert_eq!(best["2002"].len(), 1);
}

#[tokio::test]
async fn b_side_resolves_by_vendor_code() {
    let engine = engine(reference_catalog());
    let links = engine
        .link_b_to_a_by(BFilter::by_vendor_codes(ids(&["V1", " "])), DedupMode::PreserveMultiplicity)
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links["50"], vec!["1001"]);

    let rows = engine.get_all_links_by(None, BFilter::by_vendor_codes(ids(&["V2", "V3"]))).await.unwrap();
    let pairs: Vec<(&str, &str)> = rows.iter().map(|r| (r.a_id.as_str(), r.b_id.as_str())).collect();
    assert_eq!(pairs, vec![("2002", "51"), ("2002", "60")]);
}

#[tokio::test]
async fn b_side_resolves_by_internal_id() {
    let engine = engine(reference_catalog());
    let links = engine
        .link_b_to_a_by(BFilter::by_internal_ids(ids(&["9001"])), DedupMode::PreserveMultiplicity)
        .await
        .unwrap();
    assert_eq!(links["50"], vec!["1001"]);

    let rows = engine.get_all_links_by(None, BFilter::by_internal_ids(ids(&["9001"]))).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].b_internal_id.as_deref(), Some("9001"));
}

#[tokio::test]
async fn blank_vendor_codes_select_nothing() {
    let engine = engine(reference_catalog());
    let links = engine
        .link_b_to_a_by(BFilter::by_vendor_codes(ids(&["", "  "])), DedupMode::PreserveMultiplicity)
        .await
        .unwrap();
    assert!(links.is_empty());
}

#[tokio::test]
async fn padded_stored_id_with_primary_link_is_matched() {
    let catalog = InMemoryCatalog::new();
    catalog.add_a_item("1001 ", Some("222")).unwrap();
    catalog.add_b_product("50", "V1", None).unwrap();
    catalog.append_b_barcode("50", "222").unwrap();
    let engine = engine(Arc::new(catalog));

    let rows = engine.get_all_links(None, None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_primary);

    let result = engine.collect_for_catalog(CatalogScope::All, &BatchConfig::default()).await.unwrap();
    assert!(result.is_matched(&rows[0].a_id));
    assert!(result.unmatched_ids.is_empty());
    assert_eq!(result.stats.unique_result_count, 1);
}

#[tokio::test]
async fn both_directions_agree() {
    let engine = engine(reference_catalog());
    let forward = engine.link_a_to_b(&ids(&["1001", "2002"])).await.unwrap();
    let backward = engine.link_b_to_a(&ids(&["50", "51", "60"])).await.unwrap();

    for (a_id, b_ids) in &forward {
        for b_id in b_ids {
            assert!(backward[b_id].contains(a_id), "{b_id} should link back to {a_id}");
        }
    }
}

#[tokio::test]
async fn repeated_calls_are_idempotent() {
    let engine = engine(reference_catalog());
    let first = engine.collect_for_catalog(CatalogScope::All, &BatchConfig::default()).await.unwrap();
    let second = engine.collect_for_catalog(CatalogScope::All, &BatchConfig::default()).await.unwrap();

    assert_eq!(first.matched_ids, second.matched_ids);
    assert_eq!(first.unmatched_ids, second.unmatched_ids);
    assert_eq!(first.ambiguous_mappings, second.ambiguous_mappings);
    assert_eq!(engine.get_all_links(None, None).await.unwrap(), engine.get_all_links(None, None).await.unwrap());
}

#[tokio::test]
async fn sqlite_backed_engine_matches_in_memory() -> anyhow::Result<()> {
    let db = DatabaseConnection::new("sqlite::memory:").await?;
    db.migrate().await?;
    let repo = SqliteBarcodeRepository::new(db.pool().clone());
    repo.upsert_a_item("1001", Some("111;222;333")).await?;
    repo.upsert_a_item("2002", Some("555")).await?;
    repo.upsert_a_item("3003", Some("777")).await?;
    repo.upsert_b_product("50", "V1", Some("9001")).await?;
    repo.upsert_b_product("51", "V2", None).await?;
    repo.upsert_b_product("60", "V3", None).await?;
    for (b_id, barcode) in [("50", "222"), ("50", "999"), ("51", "555"), ("60", "555")] {
        repo.append_b_barcode(b_id, barcode).await?;
    }

    let sqlite = LinkEngine::new(Arc::new(repo), EngineConfig::default())?;
    let memory = engine(reference_catalog());

    let from_sqlite = sqlite.collect_for_catalog(CatalogScope::All, &BatchConfig::default()).await?;
    let from_memory = memory.collect_for_catalog(CatalogScope::All, &BatchConfig::default()).await?;
    assert_eq!(from_sqlite.matched_ids, from_memory.matched_ids);
    assert_eq!(from_sqlite.ambiguous_mappings, from_memory.ambiguous_mappings);
    assert_eq!(sqlite.get_all_links(None, None).await?, memory.get_all_links(None, None).await?);
    Ok(())
}
