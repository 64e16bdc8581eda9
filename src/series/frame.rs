//! Raw KPI observations.
//!
//! The connector hands back an untyped `RowSet`; `RawSeriesFrame` keeps only
//! the columns a KPI cares about, with the datetime column parsed and the
//! metric coerced to a float.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::KpiConfig;

/// Errors raised while shaping connector rows into a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Column '{0}' missing from source rows")]
    MissingColumn(String),

    #[error("Row {row}: cannot parse '{value}' as a timestamp")]
    InvalidTimestamp { row: usize, value: String },

    #[error("Row {row}: metric value '{value}' is not numeric")]
    InvalidMetric { row: usize, value: String },

    #[error("Row {row} has {actual} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Untyped table returned by the connector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_index(&self, name: &str) -> Result<usize, FrameError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| FrameError::MissingColumn(name.to_string()))
    }
}

/// One parsed observation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub timestamp: NaiveDateTime,
    pub metric: Option<f64>,
    /// Values of the KPI's dimension columns, in configured order.
    pub dimensions: Vec<Option<String>>,
}

/// Time-indexed raw observations for one KPI over a bounded window.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeriesFrame {
    pub dimensions: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawSeriesFrame {
    pub fn new(dimensions: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self { dimensions, rows }
    }

    /// Shape connector rows for `kpi`, parsing the datetime column.
    pub fn from_row_set(rows: &RowSet, kpi: &KpiConfig) -> Result<Self, FrameError> {
        let dt_idx = rows.column_index(&kpi.datetime_column)?;
        let metric_idx = rows.column_index(&kpi.metric)?;
        let dim_idx = kpi
            .dimensions
            .iter()
            .map(|d| rows.column_index(d))
            .collect::<Result<Vec<_>, _>>()?;

        let mut parsed = Vec::with_capacity(rows.row_count());
        for (row_no, row) in rows.rows.iter().enumerate() {
            if row.len() != rows.columns.len() {
                return Err(FrameError::RaggedRow {
                    row: row_no,
                    expected: rows.columns.len(),
                    actual: row.len(),
                });
            }

            let timestamp =
                parse_timestamp(&row[dt_idx]).ok_or_else(|| FrameError::InvalidTimestamp {
                    row: row_no,
                    value: row[dt_idx].to_string(),
                })?;
            let metric =
                parse_metric(&row[metric_idx]).ok_or_else(|| FrameError::InvalidMetric {
                    row: row_no,
                    value: row[metric_idx].to_string(),
                })?;
            let dimensions = dim_idx.iter().map(|&i| dimension_value(&row[i])).collect();

            parsed.push(RawRow {
                timestamp,
                metric,
                dimensions,
            });
        }

        Ok(Self::new(kpi.dimensions.clone(), parsed))
    }

    /// Keep rows with `base_date < timestamp <= end_date`, dates taken at midnight.
    pub fn retain_window(&mut self, base_date: NaiveDate, end_date: NaiveDate) {
        let lower = base_date.and_time(chrono::NaiveTime::MIN);
        let upper = end_date.and_time(chrono::NaiveTime::MIN);
        self.rows
            .retain(|row| row.timestamp > lower && row.timestamp <= upper);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct non-null values of one dimension, in first-seen order.
    pub fn distinct_values(&self, dim: usize) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut values = Vec::new();
        for row in &self.rows {
            if let Some(Some(value)) = row.dimensions.get(dim) {
                if seen.insert(value.as_str()) {
                    values.push(value.clone());
                }
            }
        }
        values
    }
}

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a connector value into a naive timestamp.
///
/// Offsets are normalized to UTC. Integers are epoch seconds.
pub fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.naive_utc()),
        _ => None,
    }
}

pub(crate) fn parse_timestamp_str(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
}

/// `None` when the value is not numeric; `Some(None)` for a missing metric.
fn parse_metric(value: &Value) -> Option<Option<f64>> {
    match value {
        Value::Null => Some(None),
        Value::Number(n) => Some(n.as_f64().filter(|v| v.is_finite())),
        Value::String(s) if s.trim().is_empty() => Some(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .map(|v| v.is_finite().then_some(v)),
        _ => None,
    }
}

fn dimension_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
