//! WatermarkStore and OutputStore interface tests.
//!
//! Every test uses its own KPI id so the suite can share one store.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;

use kpiscope::series::{AnomalyRecord, DqKind, SeriesKey, SeriesType};
use kpiscope::storage::{OutputStore, WatermarkStore};

pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// Create a record for `key` at the given day.
pub fn make_record(key: &SeriesKey, day: u32) -> AnomalyRecord {
    AnomalyRecord {
        kpi_id: key.kpi_id,
        anomaly_type: key.series_type,
        series_type: key.subgroup.clone(),
        data_datetime: at(day, 0),
        y: Some(f64::from(day) * 1.5),
        is_anomaly: day % 2 == 0,
        extra: [("severity".to_string(), json!(day))].into_iter().collect(),
    }
}

// =============================================================================
// WatermarkStore::last_timestamp tests
// =============================================================================

pub async fn test_watermark_missing<S: WatermarkStore>(store: &S) {
    let watermark = store
        .last_timestamp(1001, SeriesType::Overall, None)
        .await
        .expect("lookup should succeed");
    assert!(watermark.is_none(), "no records should mean no watermark");
}

pub async fn test_watermark_is_latest_timestamp<S: WatermarkStore + OutputStore>(store: &S) {
    let key = SeriesKey::subdim(1002, r#"`region`=="us""#);

    store
        .append(&[make_record(&key, 3), make_record(&key, 5), make_record(&key, 4)])
        .await
        .expect("append should succeed");

    let watermark = store
        .last_timestamp(key.kpi_id, key.series_type, key.subgroup())
        .await
        .expect("lookup should succeed");
    assert_eq!(watermark, Some(at(5, 0)));
}

pub async fn test_watermark_overall_matches_null_subgroup<S: WatermarkStore + OutputStore>(
    store: &S,
) {
    let key = SeriesKey::overall(1003);
    store
        .append(&[make_record(&key, 7)])
        .await
        .expect("append should succeed");

    assert_eq!(
        store
            .last_timestamp(1003, SeriesType::Overall, None)
            .await
            .expect("lookup should succeed"),
        Some(at(7, 0))
    );
    assert!(store
        .last_timestamp(1003, SeriesType::Overall, Some("max"))
        .await
        .expect("lookup should succeed")
        .is_none());
}

pub async fn test_watermark_keys_are_isolated<S: WatermarkStore + OutputStore>(store: &S) {
    let max = SeriesKey::dq(1004, DqKind::Max);
    let missing = SeriesKey::dq(1004, DqKind::Missing);
    let other_kpi = SeriesKey::dq(1005, DqKind::Max);

    store
        .append(&[make_record(&max, 9), make_record(&missing, 2)])
        .await
        .expect("append should succeed");

    assert_eq!(
        store
            .last_timestamp(1004, SeriesType::Dq, Some("max"))
            .await
            .unwrap(),
        Some(at(9, 0))
    );
    assert_eq!(
        store
            .last_timestamp(1004, SeriesType::Dq, Some("missing"))
            .await
            .unwrap(),
        Some(at(2, 0))
    );
    assert!(store
        .last_timestamp(other_kpi.kpi_id, other_kpi.series_type, other_kpi.subgroup())
        .await
        .unwrap()
        .is_none());
    assert!(store
        .last_timestamp(1004, SeriesType::Subdim, Some("max"))
        .await
        .unwrap()
        .is_none());
}

pub async fn test_watermark_keeps_time_of_day<S: WatermarkStore + OutputStore>(store: &S) {
    let key = SeriesKey::overall(1006);
    let mut record = make_record(&key, 4);
    record.data_datetime = at(4, 13);

    store.append(&[make_record(&key, 4), record]).await.unwrap();

    assert_eq!(
        store.last_timestamp(1006, SeriesType::Overall, None).await.unwrap(),
        Some(at(4, 13))
    );
}

pub async fn test_watermark_round_trips_exact_timestamp<S: WatermarkStore + OutputStore>(
    store: &S,
) {
    let key = SeriesKey::dq(1009, DqKind::Missing);
    let early = NaiveDate::from_ymd_opt(2023, 1, 10)
        .unwrap()
        .and_hms_milli_opt(10, 0, 0, 250)
        .unwrap();
    let late = NaiveDate::from_ymd_opt(2023, 1, 10)
        .unwrap()
        .and_hms_nano_opt(10, 0, 0, 750_000_001)
        .unwrap();

    let mut first = make_record(&key, 10);
    first.data_datetime = late;
    let mut second = make_record(&key, 10);
    second.data_datetime = early;
    store.append(&[first, second]).await.unwrap();

    assert_eq!(
        store
            .last_timestamp(1009, SeriesType::Dq, Some("missing"))
            .await
            .unwrap(),
        Some(late)
    );
}

// =============================================================================
// OutputStore::append tests
// =============================================================================

pub async fn test_append_empty<S: WatermarkStore + OutputStore>(store: &S) {
    store.append(&[]).await.expect("empty append should succeed");
    assert!(store
        .last_timestamp(1007, SeriesType::Overall, None)
        .await
        .unwrap()
        .is_none());
}

pub async fn test_append_missing_value<S: WatermarkStore + OutputStore>(store: &S) {
    let key = SeriesKey::dq(1008, DqKind::Mean);
    let mut record = make_record(&key, 6);
    record.y = None;

    store.append(&[record]).await.expect("append should succeed");
    assert_eq!(
        store
            .last_timestamp(1008, SeriesType::Dq, Some("mean"))
            .await
            .unwrap(),
        Some(at(6, 0))
    );
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all anomaly store interface tests against a store implementation.
#[macro_export]
macro_rules! run_anomaly_store_tests {
    ($store:expr) => {
        use $crate::storage::anomaly_store_tests::*;

        // watermark tests
        test_watermark_missing($store).await;
        println!("  test_watermark_missing: PASSED");

        test_watermark_is_latest_timestamp($store).await;
        println!("  test_watermark_is_latest_timestamp: PASSED");

        test_watermark_overall_matches_null_subgroup($store).await;
        println!("  test_watermark_overall_matches_null_subgroup: PASSED");

        test_watermark_keys_are_isolated($store).await;
        println!("  test_watermark_keys_are_isolated: PASSED");

        test_watermark_keeps_time_of_day($store).await;
        println!("  test_watermark_keeps_time_of_day: PASSED");

        test_watermark_round_trips_exact_timestamp($store).await;
        println!("  test_watermark_round_trips_exact_timestamp: PASSED");

        // append tests
        test_append_empty($store).await;
        println!("  test_append_empty: PASSED");

        test_append_missing_value($store).await;
        println!("  test_append_missing_value: PASSED");
    };
}
