//! Shared storage integration tests.
//!
//! Tests the WatermarkStore, OutputStore and RcaReadStore interfaces against
//! all implementations. Each implementation module imports these test
//! functions and runs them.

pub mod anomaly_store_tests;
pub mod rca_store_tests;
