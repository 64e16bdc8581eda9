//! Mock RcaReadStore implementation for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::storage::{RcaQuery, RcaReadStore, RcaRecord, Result, StorageError};

/// Mock RCA store that keeps snapshots in memory.
#[derive(Default)]
pub struct MockRcaStore {
    records: RwLock<Vec<RcaRecord>>,
    fail_on_read: RwLock<bool>,
}

impl MockRcaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: RcaRecord) {
        self.records.write().await.push(record);
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }
}

#[async_trait]
impl RcaReadStore for MockRcaStore {
    async fn latest(&self, query: &RcaQuery) -> Result<Option<RcaRecord>> {
        if *self.fail_on_read.read().await {
            return Err(StorageError::Unavailable("rca read".to_string()));
        }
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.matches(query))
            .max_by_key(|r| r.created_at)
            .cloned())
    }
}
