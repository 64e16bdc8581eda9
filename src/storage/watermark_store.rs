//! WatermarkStore trait definition.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::Result;
use crate::series::SeriesType;

/// Interface for incremental-detection watermarks.
///
/// The watermark of a stream is the latest `data_datetime` already persisted
/// for it. Detection only adds rows strictly after it.
///
/// # Key
///
/// Watermarks are keyed by `(kpi_id, series_type, subgroup)`:
/// - `series_type`: overall, subdim or dq
/// - `subgroup`: the subgroup filter string or DQ kind; `None` for overall
///   (matched as an absent value, not as a wildcard)
///
/// # Implementations
///
/// - `SqlAnomalyStore`: SQL storage, derived from the output table
/// - `MockAnomalyStore`: In-memory mock for testing
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Latest persisted timestamp for the stream.
    ///
    /// Returns `None` if nothing has been persisted yet.
    async fn last_timestamp(
        &self,
        kpi_id: i64,
        series_type: SeriesType,
        subgroup: Option<&str>,
    ) -> Result<Option<NaiveDateTime>>;
}
