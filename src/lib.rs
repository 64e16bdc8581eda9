//! kpiscope - KPI anomaly detection
//!
//! Loads KPI time series from arbitrary sources, splits them into overall,
//! per-subgroup and data-quality streams, runs a named anomaly model per
//! stream and appends the results incrementally. Also serves precomputed
//! root-cause-analysis snapshots with well-formed fallbacks.

pub mod config;
pub mod detection;
pub mod loader;
pub mod rca;
pub mod series;
pub mod storage;
pub mod subgroups;
pub mod utils;
