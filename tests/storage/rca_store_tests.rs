//! RcaReadStore interface tests.
//!
//! These tests verify the contract of the RcaReadStore trait. Snapshots are
//! written through [`SeedRca`], which each implementation module provides.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};

use kpiscope::storage::{DimensionFilter, RcaDataType, RcaQuery, RcaReadStore, RcaRecord};

/// Write access needed to set up RCA tests.
#[async_trait]
pub trait SeedRca {
    async fn seed(&self, record: RcaRecord);
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 3, day).unwrap()
}

fn created(day: u32, hour: u32) -> NaiveDateTime {
    date(day).and_hms_opt(hour, 0, 0).unwrap()
}

/// Create a snapshot; `tag` identifies it in assertions.
pub fn make_rca(
    kpi_id: i64,
    data_type: RcaDataType,
    end_day: u32,
    dimension: Option<&str>,
    created_at: NaiveDateTime,
    tag: &str,
) -> RcaRecord {
    RcaRecord {
        kpi_id,
        data_type,
        timeline: "last_30_days".to_string(),
        end_date: date(end_day),
        dimension: dimension.map(str::to_string),
        created_at,
        data: json!({ "tag": tag, "data_table": [] }),
    }
}

fn query(kpi_id: i64, data_type: RcaDataType, end_day: u32, dimension: DimensionFilter) -> RcaQuery {
    RcaQuery {
        kpi_id,
        data_type,
        timeline: Some("last_30_days".to_string()),
        end_date: date(end_day),
        dimension,
    }
}

fn tag(record: &RcaRecord) -> &str {
    record.data["tag"].as_str().unwrap_or_default()
}

// =============================================================================
// RcaReadStore::latest tests
// =============================================================================

pub async fn test_latest_missing<S: RcaReadStore>(store: &S) {
    let found = store
        .latest(&query(2001, RcaDataType::Agg, 31, DimensionFilter::Any))
        .await
        .expect("lookup should succeed");
    assert!(found.is_none());
}

pub async fn test_latest_prefers_newest_created<S: RcaReadStore + SeedRca>(store: &S) {
    store
        .seed(make_rca(2002, RcaDataType::Agg, 10, None, created(10, 1), "first"))
        .await;
    store
        .seed(make_rca(2002, RcaDataType::Agg, 9, None, created(12, 1), "rerun"))
        .await;

    let found = store
        .latest(&query(2002, RcaDataType::Agg, 31, DimensionFilter::Any))
        .await
        .expect("lookup should succeed")
        .expect("snapshot should exist");
    assert_eq!(tag(&found), "rerun");
    assert_eq!(found.end_date, date(9));
    assert_eq!(found.created_at, created(12, 1));
}

pub async fn test_latest_bounded_by_end_date<S: RcaReadStore + SeedRca>(store: &S) {
    store
        .seed(make_rca(2003, RcaDataType::Line, 15, None, created(15, 1), "mid"))
        .await;
    store
        .seed(make_rca(2003, RcaDataType::Line, 20, None, created(20, 1), "late"))
        .await;

    let mut q = query(2003, RcaDataType::Line, 15, DimensionFilter::Any);
    q.timeline = None;
    let found = store.latest(&q).await.unwrap().expect("snapshot should exist");
    assert_eq!(tag(&found), "mid");

    q.end_date = date(14);
    assert!(store.latest(&q).await.unwrap().is_none());
}

pub async fn test_latest_dimension_filter<S: RcaReadStore + SeedRca>(store: &S) {
    store
        .seed(make_rca(2004, RcaDataType::Rca, 5, None, created(5, 1), "overall"))
        .await;
    store
        .seed(make_rca(2004, RcaDataType::Rca, 5, Some("region"), created(5, 2), "region"))
        .await;

    let overall = store
        .latest(&query(2004, RcaDataType::Rca, 31, DimensionFilter::Overall))
        .await
        .unwrap()
        .expect("overall snapshot should exist");
    assert_eq!(tag(&overall), "overall");
    assert_eq!(overall.dimension, None);

    let region = store
        .latest(&query(2004, RcaDataType::Rca, 31, DimensionFilter::Named("region".into())))
        .await
        .unwrap()
        .expect("region snapshot should exist");
    assert_eq!(tag(&region), "region");

    let any = store
        .latest(&query(2004, RcaDataType::Rca, 31, DimensionFilter::Any))
        .await
        .unwrap()
        .expect("some snapshot should exist");
    assert_eq!(tag(&any), "region");

    assert!(store
        .latest(&query(2004, RcaDataType::Rca, 31, DimensionFilter::Named("channel".into())))
        .await
        .unwrap()
        .is_none());
}

pub async fn test_latest_filters_type_and_timeline<S: RcaReadStore + SeedRca>(store: &S) {
    let mut weekly = make_rca(2005, RcaDataType::Htable, 5, Some("region"), created(5, 1), "weekly");
    weekly.timeline = "last_7_days".to_string();
    store.seed(weekly).await;

    assert!(store
        .latest(&query(2005, RcaDataType::Htable, 31, DimensionFilter::Any))
        .await
        .unwrap()
        .is_none());
    assert!(store
        .latest(&query(2005, RcaDataType::Rca, 31, DimensionFilter::Any))
        .await
        .unwrap()
        .is_none());

    let mut q = query(2005, RcaDataType::Htable, 31, DimensionFilter::Any);
    q.timeline = Some("last_7_days".to_string());
    let found = store.latest(&q).await.unwrap().expect("snapshot should exist");
    assert_eq!(found.timeline, "last_7_days");
    assert_eq!(found.data["data_table"], Value::Array(Vec::new()));
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all RcaReadStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_rca_store_tests {
    ($store:expr) => {
        use $crate::storage::rca_store_tests::*;

        test_latest_missing($store).await;
        println!("  test_latest_missing: PASSED");

        test_latest_prefers_newest_created($store).await;
        println!("  test_latest_prefers_newest_created: PASSED");

        test_latest_bounded_by_end_date($store).await;
        println!("  test_latest_bounded_by_end_date: PASSED");

        test_latest_dimension_filter($store).await;
        println!("  test_latest_dimension_filter: PASSED");

        test_latest_filters_type_and_timeline($store).await;
        println!("  test_latest_filters_type_and_timeline: PASSED");
    };
}
