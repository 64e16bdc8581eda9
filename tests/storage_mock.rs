//! In-memory storage contract tests.
//!
//! Run with: cargo test --test storage_mock --features test-utils
//!
//! Keeps the mocks used by unit tests honest against the same contract the
//! SQL stores satisfy.

mod storage;

use async_trait::async_trait;

use kpiscope::storage::mock::{MockAnomalyStore, MockRcaStore};
use kpiscope::storage::RcaRecord;

use storage::rca_store_tests::SeedRca;

#[async_trait]
impl SeedRca for MockRcaStore {
    async fn seed(&self, record: RcaRecord) {
        self.insert(record).await;
    }
}

#[tokio::test]
async fn test_mock_anomaly_store() {
    println!("=== Mock anomaly store Tests ===");

    let store = MockAnomalyStore::new();
    run_anomaly_store_tests!(&store);

    println!("=== All mock anomaly store tests PASSED ===");
}

#[tokio::test]
async fn test_mock_rca_store() {
    println!("=== Mock RcaReadStore Tests ===");

    let store = MockRcaStore::new();
    run_rca_store_tests!(&store);

    println!("=== All mock RcaReadStore tests PASSED ===");
}
