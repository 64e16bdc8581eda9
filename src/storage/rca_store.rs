//! RcaReadStore trait definition.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::Result;

/// Kind of precomputed RCA snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RcaDataType {
    /// Period-over-period aggregate comparison.
    Agg,
    /// KPI line chart.
    Line,
    /// Impact breakdown by dimension.
    Rca,
    /// Hierarchical drill-down table.
    Htable,
}

impl RcaDataType {
    pub fn as_str(self) -> &'static str {
        match self {
            RcaDataType::Agg => "agg",
            RcaDataType::Line => "line",
            RcaDataType::Rca => "rca",
            RcaDataType::Htable => "htable",
        }
    }
}

impl fmt::Display for RcaDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RcaDataType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "agg" => Ok(RcaDataType::Agg),
            "line" => Ok(RcaDataType::Line),
            "rca" => Ok(RcaDataType::Rca),
            "htable" => Ok(RcaDataType::Htable),
            other => Err(format!("unknown RCA data type: {other}")),
        }
    }
}

/// How a lookup constrains the `dimension` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionFilter {
    /// No constraint.
    Any,
    /// Records computed across all dimensions (stored dimension is null).
    Overall,
    /// Records for one dimension.
    Named(String),
}

impl From<Option<&str>> for DimensionFilter {
    fn from(dimension: Option<&str>) -> Self {
        match dimension {
            Some(name) => DimensionFilter::Named(name.to_string()),
            None => DimensionFilter::Overall,
        }
    }
}

/// Lookup of the authoritative RCA snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcaQuery {
    pub kpi_id: i64,
    pub data_type: RcaDataType,
    /// `None` matches any timeline.
    pub timeline: Option<String>,
    /// Inclusive upper bound on the record's end date.
    pub end_date: NaiveDate,
    pub dimension: DimensionFilter,
}

/// Precomputed RCA snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcaRecord {
    pub kpi_id: i64,
    pub data_type: RcaDataType,
    pub timeline: String,
    pub end_date: NaiveDate,
    pub dimension: Option<String>,
    pub created_at: NaiveDateTime,
    pub data: serde_json::Value,
}

impl RcaRecord {
    /// Whether this record satisfies `query`, ignoring recency.
    pub fn matches(&self, query: &RcaQuery) -> bool {
        self.kpi_id == query.kpi_id
            && self.data_type == query.data_type
            && query.timeline.as_deref().map_or(true, |t| t == self.timeline)
            && self.end_date <= query.end_date
            && match &query.dimension {
                DimensionFilter::Any => true,
                DimensionFilter::Overall => self.dimension.is_none(),
                DimensionFilter::Named(name) => self.dimension.as_deref() == Some(name.as_str()),
            }
    }
}

/// Read path for RCA snapshots.
///
/// The most recently created record matching the query is authoritative.
#[async_trait]
pub trait RcaReadStore: Send + Sync {
    /// Latest-created record matching `query`, or `None`.
    async fn latest(&self, query: &RcaQuery) -> Result<Option<RcaRecord>>;
}
