//! OutputStore trait definition.

use async_trait::async_trait;

use super::Result;
use crate::series::AnomalyRecord;

/// Interface for anomaly output persistence.
///
/// Append-only: no upsert and no deduplication. Streams stay free of
/// duplicate timestamps because callers only append rows past the stream's
/// watermark.
#[async_trait]
pub trait OutputStore: Send + Sync {
    /// Append records to the output table.
    async fn append(&self, records: &[AnomalyRecord]) -> Result<()>;
}
