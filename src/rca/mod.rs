//! Read path for precomputed root-cause-analysis snapshots.
//!
//! Every endpoint answers with a well-formed payload: lookups that find
//! nothing, and lookups that fail, both produce the payload's default. The
//! latest-created snapshot with `end_date <= ` the KPI's RCA end date wins.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, warn};

mod datetime;
mod payload;


pub use datetime::{epoch_millis, parse_rca_timestamp};
pub use payload::{
    AggregationPayload, HierarchicalPayload, LinePoint, RcaAnalysisPayload, RcaChart, RcaPayload,
};

use crate::config::KpiConfig;
use crate::storage::{
    DimensionFilter, KpiStore, RcaDataType, RcaQuery, RcaReadStore, StorageError,
};

/// Default timeline of the RCA endpoints.
pub const DEFAULT_TIMELINE: &str = "last_30_days";

/// Reasons an RCA lookup falls back to its default payload.
#[derive(Debug, thiserror::Error)]
pub enum RcaError {
    #[error("unknown KPI: {0}")]
    UnknownKpi(i64),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("snapshot does not match the expected shape: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("no line data on or before {0}")]
    NoLineData(NaiveDate),

    #[error("unparsable analysis date: {0}")]
    InvalidDate(String),
}

/// Serves RCA snapshots for KPIs.
pub struct RcaService {
    kpis: Arc<dyn KpiStore>,
    store: Arc<dyn RcaReadStore>,
    today: Option<NaiveDate>,
}

impl RcaService {
    pub fn new(kpis: Arc<dyn KpiStore>, store: Arc<dyn RcaReadStore>) -> Self {
        Self {
            kpis,
            store,
            today: None,
        }
    }

    /// Pin "today" for dynamic KPIs.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Upper bound on snapshot end dates: the static end date, else today.
    pub fn end_date(&self, kpi: &KpiConfig) -> NaiveDate {
        kpi.static_end_date()
            .or(self.today)
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    pub async fn kpi_aggregation(&self, kpi_id: i64, timeline: &str) -> AggregationPayload {
        self.serve(kpi_id, Some(timeline), DimensionFilter::Any)
            .await
    }

    /// Line chart of the latest snapshot; empty when none exists.
    pub async fn kpi_line_data(&self, kpi_id: i64) -> Vec<LinePoint> {
        match self.line_data(kpi_id).await {
            Ok(points) => points,
            Err(e) => {
                error!(kpi_id, error = %e, "Error in KPI line data retrieval");
                Vec::new()
            }
        }
    }

    /// Breakdown for `dimension`, or across all dimensions when `None`.
    pub async fn rca_analysis(
        &self,
        kpi_id: i64,
        timeline: &str,
        dimension: Option<&str>,
    ) -> RcaAnalysisPayload {
        self.serve(kpi_id, Some(timeline), DimensionFilter::from(dimension))
            .await
    }

    pub async fn rca_hierarchical_data(
        &self,
        kpi_id: i64,
        timeline: &str,
        dimension: Option<&str>,
    ) -> HierarchicalPayload {
        self.serve(kpi_id, Some(timeline), DimensionFilter::from(dimension))
            .await
    }

    /// Date of the last point of the latest line snapshot, in epoch milliseconds.
    pub async fn analysis_date(&self, kpi_id: i64, end_date: NaiveDate) -> Result<i64, RcaError> {
        let points = self
            .line_points(kpi_id, end_date)
            .await?
            .unwrap_or_default();
        let last = points.last().ok_or(RcaError::NoLineData(end_date))?;
        let ts = parse_rca_timestamp(&last.date)
            .ok_or_else(|| RcaError::InvalidDate(last.date.clone()))?;
        Ok(epoch_millis(ts))
    }

    async fn serve<P: RcaPayload>(
        &self,
        kpi_id: i64,
        timeline: Option<&str>,
        dimension: DimensionFilter,
    ) -> P {
        match self.snapshot::<P>(kpi_id, timeline, dimension).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(kpi_id, data_type = %P::DATA_TYPE, "No RCA snapshot, serving default");
                P::default()
            }
            Err(e) => {
                error!(kpi_id, error = %e, "Error in {} retrieval", P::LABEL);
                P::default()
            }
        }
    }

    async fn snapshot<P: RcaPayload>(
        &self,
        kpi_id: i64,
        timeline: Option<&str>,
        dimension: DimensionFilter,
    ) -> Result<Option<P>, RcaError> {
        let end_date = self.resolve_end_date(kpi_id).await?;
        let query = RcaQuery {
            kpi_id,
            data_type: P::DATA_TYPE,
            timeline: timeline.map(str::to_string),
            end_date,
            dimension,
        };

        let Some(record) = self.store.latest(&query).await? else {
            return Ok(None);
        };
        let mut payload: P = serde_json::from_value(record.data)?;

        let analysis_date = match self.analysis_date(kpi_id, end_date).await {
            Ok(millis) => Some(millis),
            Err(e) => {
                warn!(kpi_id, error = %e, "Analysis date unavailable");
                None
            }
        };
        payload.set_analysis_date(analysis_date);

        Ok(Some(payload))
    }

    async fn line_data(&self, kpi_id: i64) -> Result<Vec<LinePoint>, RcaError> {
        let end_date = self.resolve_end_date(kpi_id).await?;
        Ok(self
            .line_points(kpi_id, end_date)
            .await?
            .unwrap_or_default())
    }

    async fn resolve_end_date(&self, kpi_id: i64) -> Result<NaiveDate, RcaError> {
        let kpi = self
            .kpis
            .get(kpi_id)
            .await?
            .ok_or(RcaError::UnknownKpi(kpi_id))?;
        Ok(self.end_date(&kpi))
    }

    async fn line_points(
        &self,
        kpi_id: i64,
        end_date: NaiveDate,
    ) -> Result<Option<Vec<LinePoint>>, RcaError> {
        let query = RcaQuery {
            kpi_id,
            data_type: RcaDataType::Line,
            timeline: None,
            end_date,
            dimension: DimensionFilter::Any,
        };
        match self.store.latest(&query).await? {
            Some(record) => Ok(Some(serde_json::from_value(record.data)?)),
            None => Ok(None),
        }
    }
}
