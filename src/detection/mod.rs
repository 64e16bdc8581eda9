//! Anomaly detection orchestration.
//!
//! `AnomalyDetectionController` drives one KPI through every stream in order:
//! overall, then each retained subgroup, then the four data-quality kinds.
//! Each stream is incremental: its watermark (the latest persisted
//! timestamp) bounds what gets appended, so rerunning without new source
//! data appends nothing.
//!
//! Load and overall failures abort the run. Subgroup and DQ failures are
//! logged and recorded in the [`DetectionReport`], and the run continues.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

mod model;
mod report;


pub use model::{AnomalyModel, AnomalyPoint, ModelError, ModelInput, ModelRegistry};
pub use report::{DetectionReport, SeriesOutcome, SeriesStatus};

use crate::config::{ConfigError, DetectionConfig, KpiConfig};
use crate::loader::{DataLoader, LoadError};
use crate::series::{AnomalyRecord, DqKind, SeriesAggregator, SeriesKey, SeriesType, TimeSeries};
use crate::storage::{OutputStore, StorageError, WatermarkStore};
use crate::subgroups;

/// Errors that abort a detection run.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("invalid KPI configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to load KPI data: {0}")]
    Load(#[from] LoadError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Run-level knobs.
#[derive(Debug, Clone, Default)]
pub struct DetectionOptions {
    /// Process only the first N retained subgroups.
    pub subgroup_limit: Option<usize>,
    /// Stands in for "now" when resolving the window of dynamic KPIs.
    pub reference_time: Option<NaiveDateTime>,
}

impl From<&DetectionConfig> for DetectionOptions {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            subgroup_limit: config.subgroup_limit(),
            reference_time: None,
        }
    }
}

/// Drives detection for one KPI.
pub struct AnomalyDetectionController {
    kpi: KpiConfig,
    loader: Arc<DataLoader>,
    watermarks: Arc<dyn WatermarkStore>,
    output: Arc<dyn OutputStore>,
    models: Arc<ModelRegistry>,
    options: DetectionOptions,
}

impl AnomalyDetectionController {
    pub fn new(
        kpi: KpiConfig,
        loader: Arc<DataLoader>,
        watermarks: Arc<dyn WatermarkStore>,
        output: Arc<dyn OutputStore>,
        models: Arc<ModelRegistry>,
    ) -> Self {
        Self {
            kpi,
            loader,
            watermarks,
            output,
            models,
            options: DetectionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DetectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn kpi(&self) -> &KpiConfig {
        &self.kpi
    }

    /// Last day of the load window: the static end date, else today.
    pub fn end_date(&self) -> NaiveDate {
        self.kpi.static_end_date().unwrap_or_else(|| {
            self.options
                .reference_time
                .unwrap_or_else(|| Utc::now().naive_utc())
                .date()
        })
    }

    /// Run every stream of the KPI once.
    pub async fn detect(&self) -> Result<DetectionReport, DetectionError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("detect", kpi_id = self.kpi.id, %run_id);
        self.run(run_id).instrument(span).await
    }

    async fn run(&self, run_id: Uuid) -> Result<DetectionReport, DetectionError> {
        let kpi = &self.kpi;
        kpi.validate()?;

        let overall_watermark = self
            .watermarks
            .last_timestamp(kpi.id, SeriesType::Overall, None)
            .await?;
        let end_date = self.end_date();

        info!(
            model = %kpi.model_name,
            %end_date,
            watermark = ?overall_watermark,
            "Starting anomaly detection"
        );

        let frame = self.loader.load(kpi, end_date).await?;
        let aggregator = SeriesAggregator::new(&frame, kpi.freq, kpi.aggregation);
        let mut report = DetectionReport::new(run_id, kpi.id, end_date);

        let overall = SeriesKey::overall(kpi.id);
        let rows = self
            .process(&overall, aggregator.overall(), overall_watermark)
            .await?;
        report.record(overall, SeriesStatus::Persisted { rows });

        let retained = subgroups::filter(subgroups::enumerate(&frame), &frame, kpi.period);
        let limit = self.options.subgroup_limit.unwrap_or(retained.len());
        if retained.len() > limit {
            info!(
                retained = retained.len(),
                limit, "Limiting subgroup pass to the first subgroups"
            );
        }

        for subgroup in retained.iter().take(limit) {
            let key = SeriesKey::subdim(kpi.id, subgroup.filter_string());
            let status = self
                .process_isolated(&key, aggregator.subgroup(subgroup))
                .await;
            report.record(key, status);
        }

        for kind in DqKind::ALL {
            let key = SeriesKey::dq(kpi.id, kind);
            let status = self.process_isolated(&key, aggregator.dq(kind)).await;
            report.record(key, status);
        }

        info!(
            series = report.outcomes.len(),
            persisted_rows = report.persisted_rows(),
            failures = report.failures().count(),
            "Anomaly detection finished"
        );

        Ok(report)
    }

    /// Process a stream against its own watermark, turning any error into a
    /// logged failure.
    async fn process_isolated(&self, key: &SeriesKey, series: TimeSeries) -> SeriesStatus {
        let result = self.process_from_watermark(key, series).await;

        match result {
            Ok(rows) => SeriesStatus::Persisted { rows },
            Err(e) => {
                warn!(
                    series_type = %key.series_type,
                    subgroup = key.subgroup().unwrap_or_default(),
                    error = %e,
                    "Series failed, continuing"
                );
                SeriesStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn process_from_watermark(
        &self,
        key: &SeriesKey,
        series: TimeSeries,
    ) -> Result<usize, DetectionError> {
        let watermark = self
            .watermarks
            .last_timestamp(key.kpi_id, key.series_type, key.subgroup())
            .await?;
        self.process(key, series, watermark).await
    }

    /// Predict one series and append the rows after `watermark`.
    async fn process(
        &self,
        key: &SeriesKey,
        series: TimeSeries,
        watermark: Option<NaiveDateTime>,
    ) -> Result<usize, DetectionError> {
        if series.is_empty() {
            debug!(series = %key, "Empty series, nothing to detect");
            return Ok(0);
        }

        let input = ModelInput {
            model_name: &self.kpi.model_name,
            series: &series.points,
            last_date: watermark,
            period: self.kpi.period,
            table_name: &self.kpi.table_name,
            series_type: key.series_type,
            subgroup: key.subgroup(),
            model_kwargs: &self.kpi.model_kwargs,
        };
        let points = self.models.predict(&input)?;
        let predicted = points.len();

        let records: Vec<AnomalyRecord> = points
            .into_iter()
            .filter(|p| watermark.map_or(true, |w| p.dt > w))
            .map(|p| p.into_record(key))
            .collect();

        if records.len() < predicted {
            debug!(
                series = %key,
                dropped = predicted - records.len(),
                "Discarded model rows at or before the watermark"
            );
        }

        if !records.is_empty() {
            self.output.append(&records).await?;
        }

        debug!(
            series = %key,
            points = series.len(),
            persisted = records.len(),
            anomalies = records.iter().filter(|r| r.is_anomaly).count(),
            "Series processed"
        );

        Ok(records.len())
    }
}
