//! Mock WatermarkStore and OutputStore implementation for testing.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;

use crate::series::{AnomalyRecord, SeriesKey, SeriesType};
use crate::storage::{OutputStore, Result, StorageError, WatermarkStore};

/// Mock anomaly store that keeps appended records in memory.
///
/// Watermarks are derived from the stored records, like the SQL store.
#[derive(Default)]
pub struct MockAnomalyStore {
    records: RwLock<Vec<AnomalyRecord>>,
    fail_on_append: RwLock<bool>,
    fail_on_watermark: RwLock<bool>,
}

impl MockAnomalyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_append(&self, fail: bool) {
        *self.fail_on_append.write().await = fail;
    }

    pub async fn set_fail_on_watermark(&self, fail: bool) {
        *self.fail_on_watermark.write().await = fail;
    }

    /// Seed records as if a previous run had persisted them.
    pub async fn seed(&self, records: impl IntoIterator<Item = AnomalyRecord>) {
        self.records.write().await.extend(records);
    }

    pub async fn stored_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Records of one stream, in append order.
    pub async fn series(&self, key: &SeriesKey) -> Vec<AnomalyRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.key() == *key)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl WatermarkStore for MockAnomalyStore {
    async fn last_timestamp(
        &self,
        kpi_id: i64,
        series_type: SeriesType,
        subgroup: Option<&str>,
    ) -> Result<Option<NaiveDateTime>> {
        if *self.fail_on_watermark.read().await {
            return Err(StorageError::Unavailable("watermark lookup".to_string()));
        }
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| {
                r.kpi_id == kpi_id
                    && r.anomaly_type == series_type
                    && r.series_type.as_deref() == subgroup
            })
            .map(|r| r.data_datetime)
            .max())
    }
}

#[async_trait]
impl OutputStore for MockAnomalyStore {
    async fn append(&self, records: &[AnomalyRecord]) -> Result<()> {
        if *self.fail_on_append.read().await {
            return Err(StorageError::Unavailable("append".to_string()));
        }
        self.records.write().await.extend_from_slice(records);
        Ok(())
    }
}
