//! Mock storage implementations for testing.

mod anomaly_store;
mod rca_store;

pub use anomaly_store::MockAnomalyStore;
pub use rca_store::MockRcaStore;
