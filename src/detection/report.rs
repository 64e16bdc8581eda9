//! Per-run outcome of a detection pass.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::series::{SeriesKey, SeriesType};

/// What happened to one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesStatus {
    /// Model ran; `rows` new records were appended (possibly zero).
    Persisted { rows: usize },
    /// Isolated failure, logged and skipped.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesOutcome {
    pub key: SeriesKey,
    pub status: SeriesStatus,
}

/// Summary of one `detect()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionReport {
    pub run_id: Uuid,
    pub kpi_id: i64,
    /// Last day of the loaded window.
    pub end_date: NaiveDate,
    pub outcomes: Vec<SeriesOutcome>,
}

impl DetectionReport {
    pub fn new(run_id: Uuid, kpi_id: i64, end_date: NaiveDate) -> Self {
        Self {
            run_id,
            kpi_id,
            end_date,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, key: SeriesKey, status: SeriesStatus) {
        self.outcomes.push(SeriesOutcome { key, status });
    }

    pub fn outcome(&self, key: &SeriesKey) -> Option<&SeriesStatus> {
        self.outcomes
            .iter()
            .find(|o| o.key == *key)
            .map(|o| &o.status)
    }

    pub fn of_type(&self, series_type: SeriesType) -> impl Iterator<Item = &SeriesOutcome> {
        self.outcomes
            .iter()
            .filter(move |o| o.key.series_type == series_type)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SeriesOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, SeriesStatus::Failed { .. }))
    }

    /// Total records appended across all series.
    pub fn persisted_rows(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                SeriesStatus::Persisted { rows } => rows,
                SeriesStatus::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}
