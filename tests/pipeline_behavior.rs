//! End-to-end behavior of the orchestrated fetch pipeline over a fake
//! platform: chunking, dedup across accounts, status bucketing, enrichment.

use std::sync::Arc;

use adpull_core::{
    AdInfo, CampaignInfo, DateRange, EntityId, FetchPolicy, MappingTables, Orchestrator,
};
use adpull_tests::{raw_row, InMemoryPlatform};
use serde_json::json;

fn range(since: &str, until: &str) -> DateRange {
    DateRange::parse(since, until).expect("valid range")
}

fn accounts(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| String::from(*id)).collect()
}

#[tokio::test]
async fn merges_two_accounts_and_deduplicates_shared_rows() {
    // Both workers report on behalf of account 9, so the shared row carries
    // an identical identity from either side.
    let shared = json!({
        "ad_id": "500", "account_id": "9",
        "date_start": "2024-03-01", "date_stop": "2024-03-01",
        "country": "US", "spend": "10.0"
    })
    .as_object()
    .expect("row fixture is an object")
    .clone();

    let platform = Arc::new(
        InMemoryPlatform::new()
            .with_rows("1", vec![raw_row("100", "2024-03-01", "US", "1.0"), shared.clone()])
            .with_rows("2", vec![raw_row("200", "2024-03-01", "DE", "2.0"), shared]),
    );

    let output = Orchestrator::new(platform, FetchPolicy::instant())
        .run(&accounts(&["1", "2"]), range("2024-03-01", "2024-03-01"))
        .await;

    assert_eq!(output.records.len(), 3);
    let shared_copies = output
        .records
        .iter()
        .filter(|record| record.ad_id == Some(EntityId::Number(500)))
        .count();
    assert_eq!(shared_copies, 1);
    assert_eq!(output.summary.total_records, 3);
}

#[tokio::test]
async fn long_ranges_are_split_into_bounded_chunks() {
    let platform = Arc::new(
        InMemoryPlatform::new().with_rows("1", vec![raw_row("1", "2024-01-01", "US", "1.0")]),
    );

    let mut policy = FetchPolicy::instant();
    policy.max_chunk_days = 4;

    Orchestrator::new(platform.clone(), policy)
        .run(&accounts(&["1"]), range("2024-01-01", "2024-01-10"))
        .await;

    let log = platform.chunk_log();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].1, "2024-01-01..2024-01-04");
    assert_eq!(log[1].1, "2024-01-05..2024-01-08");
    assert_eq!(log[2].1, "2024-01-09..2024-01-10");
}

#[tokio::test]
async fn accounts_land_in_the_right_summary_bucket() {
    let platform = Arc::new(
        InMemoryPlatform::new()
            .with_rows("1", vec![raw_row("1", "2024-03-01", "US", "1.0")])
            // Account 2 validates but every chunk comes back empty.
            .with_rows("2", Vec::new())
            .rejecting("3"),
    );

    let output = Orchestrator::new(platform, FetchPolicy::instant())
        .run(
            &accounts(&["1", "2", "3"]),
            range("2024-03-01", "2024-03-01"),
        )
        .await;

    assert_eq!(output.summary.successful_accounts, accounts(&["1"]));
    assert_eq!(output.summary.partial_accounts, accounts(&["2"]));
    assert_eq!(output.summary.failed_accounts, accounts(&["3"]));
}

#[tokio::test]
async fn mapping_tables_enrich_the_final_records() {
    let mut maps = MappingTables::default();
    maps.ads.insert(
        String::from("100"),
        AdInfo {
            name: Some(String::from("Hero Video")),
            adgroup_id: Some(String::from("20")),
            campaign_id: Some(String::from("30")),
            status: Some(String::from("ENABLE")),
        },
    );
    maps.campaigns.insert(
        String::from("30"),
        CampaignInfo {
            name: Some(String::from("Spring Push")),
            objective: Some(String::from("CONVERSIONS")),
        },
    );
    maps.adgroups
        .insert(String::from("20"), String::from("Lookalikes"));

    let platform = Arc::new(
        InMemoryPlatform::new()
            .with_rows("1", vec![raw_row("100", "2024-03-01", "US", "5.5")])
            .with_maps("1", maps),
    );

    let output = Orchestrator::new(platform, FetchPolicy::instant())
        .run(&accounts(&["1"]), range("2024-03-01", "2024-03-01"))
        .await;

    let record = &output.records[0];
    assert_eq!(record.ad_name.as_deref(), Some("Hero Video"));
    assert_eq!(record.campaign_name.as_deref(), Some("Spring Push"));
    assert_eq!(record.adgroup_name.as_deref(), Some("Lookalikes"));
    assert_eq!(record.objective.as_deref(), Some("CONVERSIONS"));
    assert_eq!(record.status.as_deref(), Some("ENABLE"));
}

#[tokio::test]
async fn records_carry_canonical_dates_and_provenance() {
    let platform = Arc::new(
        InMemoryPlatform::new().with_rows("7", vec![raw_row("1", "2024-03-05", "US", "1.0")]),
    );

    let output = Orchestrator::new(platform, FetchPolicy::instant())
        .run(&accounts(&["7"]), range("2024-03-01", "2024-03-07"))
        .await;

    let record = &output.records[0];
    assert_eq!(record.date_start.as_deref(), Some("2024-03-05T00:00:00Z"));
    assert_eq!(record.date_stop.as_deref(), Some("2024-03-05T00:00:00Z"));
    assert_eq!(record.source_account_id, Some(EntityId::Number(7)));
    assert_eq!(record.impressions, Some(100));
    assert_eq!(record.spend, Some(1.0));
    assert_eq!(record.attribution_window.as_deref(), Some("7d_click"));
}

#[tokio::test]
async fn every_window_sweep_multiplies_the_chunk_requests() {
    let platform = Arc::new(
        InMemoryPlatform::new().with_rows("1", vec![raw_row("1", "2024-03-01", "US", "1.0")]),
    );

    let mut policy = FetchPolicy::instant();
    policy.attribution_windows = vec![String::from("7d_click"), String::from("1d_view")];

    let output = Orchestrator::new(platform.clone(), policy)
        .run(&accounts(&["1"]), range("2024-03-01", "2024-03-01"))
        .await;

    assert_eq!(platform.chunk_log().len(), 2);
    // Same identity except for the window, so both survive dedup.
    assert_eq!(output.records.len(), 2);
}
