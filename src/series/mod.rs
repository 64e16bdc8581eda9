//! Time-series types shared by the loader, aggregator, models and stores.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub mod aggregate;
pub mod frame;

pub use aggregate::SeriesAggregator;
pub use frame::{FrameError, RawRow, RawSeriesFrame};

/// Kind of anomaly stream. Persisted as `anomaly_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesType {
    Overall,
    Subdim,
    Dq,
}

impl SeriesType {
    pub fn as_str(self) -> &'static str {
        match self {
            SeriesType::Overall => "overall",
            SeriesType::Subdim => "subdim",
            SeriesType::Dq => "dq",
        }
    }
}

impl fmt::Display for SeriesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeriesType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overall" => Ok(SeriesType::Overall),
            "subdim" => Ok(SeriesType::Subdim),
            "dq" => Ok(SeriesType::Dq),
            other => Err(format!("unknown series type: {other}")),
        }
    }
}

/// Data-quality statistic tracked as its own anomaly stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DqKind {
    Max,
    Count,
    Mean,
    Missing,
}

impl DqKind {
    /// Every DQ kind, in run order.
    pub const ALL: [DqKind; 4] = [DqKind::Max, DqKind::Count, DqKind::Mean, DqKind::Missing];

    pub fn as_str(self) -> &'static str {
        match self {
            DqKind::Max => "max",
            DqKind::Count => "count",
            DqKind::Mean => "mean",
            DqKind::Missing => "missing",
        }
    }
}

impl fmt::Display for DqKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one anomaly stream: `(series_type, subgroup_or_dq_kind, kpi_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub kpi_id: i64,
    pub series_type: SeriesType,
    /// Subgroup filter string for subdim, DQ kind name for dq, none for overall.
    pub subgroup: Option<String>,
}

impl SeriesKey {
    pub fn overall(kpi_id: i64) -> Self {
        Self {
            kpi_id,
            series_type: SeriesType::Overall,
            subgroup: None,
        }
    }

    pub fn subdim(kpi_id: i64, subgroup: impl Into<String>) -> Self {
        Self {
            kpi_id,
            series_type: SeriesType::Subdim,
            subgroup: Some(subgroup.into()),
        }
    }

    pub fn dq(kpi_id: i64, kind: DqKind) -> Self {
        Self {
            kpi_id,
            series_type: SeriesType::Dq,
            subgroup: Some(kind.as_str().to_string()),
        }
    }

    pub fn subgroup(&self) -> Option<&str> {
        self.subgroup.as_deref()
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subgroup {
            Some(subgroup) => write!(f, "{}/{}[{}]", self.kpi_id, self.series_type, subgroup),
            None => write!(f, "{}/{}", self.kpi_id, self.series_type),
        }
    }
}

/// One observation of an aggregated series, in the canonical `(dt, y)` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub dt: NaiveDateTime,
    pub y: Option<f64>,
}

impl SeriesPoint {
    pub fn new(dt: NaiveDateTime, y: Option<f64>) -> Self {
        Self { dt, y }
    }
}

/// Fixed-frequency (or, for missing-value DQ, per-timestamp) series ready for a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn value_at(&self, dt: NaiveDateTime) -> Option<Option<f64>> {
        self.points.iter().find(|p| p.dt == dt).map(|p| p.y)
    }
}

/// Persisted anomaly output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub kpi_id: i64,
    /// Series type of the stream.
    pub anomaly_type: SeriesType,
    /// Subgroup filter string or DQ kind; none for the overall stream.
    pub series_type: Option<String>,
    pub data_datetime: NaiveDateTime,
    pub y: Option<f64>,
    pub is_anomaly: bool,
    /// Model-specific columns.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl AnomalyRecord {
    pub fn key(&self) -> SeriesKey {
        SeriesKey {
            kpi_id: self.kpi_id,
            series_type: self.anomaly_type,
            subgroup: self.series_type.clone(),
        }
    }
}
