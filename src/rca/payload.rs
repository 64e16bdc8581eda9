//! Typed RCA payloads.
//!
//! Each payload deserializes from the stored snapshot JSON, keeps any fields
//! it does not model, and has a default that callers can render directly.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::storage::RcaDataType;

/// Shared behavior of snapshot payloads served by [`super::RcaService`].
pub trait RcaPayload: DeserializeOwned + Default {
    const DATA_TYPE: RcaDataType;
    /// Human-readable name used in logs.
    const LABEL: &'static str;

    fn set_analysis_date(&mut self, epoch_millis: Option<i64>);
}

/// Analysis date as epoch milliseconds, rendered as `""` when unknown.
mod analysis_date {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(millis) => serializer.serialize_i64(*millis),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_i64(),
            _ => None,
        })
    }
}

/// Period-over-period comparison of a KPI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationPayload {
    #[serde(default)]
    pub group1_value: f64,
    #[serde(default)]
    pub group2_value: f64,
    #[serde(default)]
    pub difference: f64,
    #[serde(default)]
    pub perc_change: f64,
    #[serde(default, with = "analysis_date")]
    pub analysis_date: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RcaPayload for AggregationPayload {
    const DATA_TYPE: RcaDataType = RcaDataType::Agg;
    const LABEL: &'static str = "KPI aggregation";

    fn set_analysis_date(&mut self, epoch_millis: Option<i64>) {
        self.analysis_date = epoch_millis;
    }
}

/// One point of the KPI line chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePoint {
    pub date: String,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

/// Chart section of an RCA breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RcaChart {
    #[serde(default)]
    pub chart_data: Vec<Value>,
    #[serde(default)]
    pub y_axis_lim: Vec<Value>,
    #[serde(default)]
    pub chart_table: Vec<Value>,
}

/// Impact breakdown of a KPI change, optionally for one dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RcaAnalysisPayload {
    #[serde(default)]
    pub chart: RcaChart,
    #[serde(default)]
    pub data_table: Vec<Value>,
    #[serde(default, with = "analysis_date")]
    pub analysis_date: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RcaPayload for RcaAnalysisPayload {
    const DATA_TYPE: RcaDataType = RcaDataType::Rca;
    const LABEL: &'static str = "RCA analysis";

    fn set_analysis_date(&mut self, epoch_millis: Option<i64>) {
        self.analysis_date = epoch_millis;
    }
}

/// Hierarchical drill-down table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalPayload {
    #[serde(default)]
    pub data_table: Vec<Value>,
    #[serde(default, with = "analysis_date")]
    pub analysis_date: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RcaPayload for HierarchicalPayload {
    const DATA_TYPE: RcaDataType = RcaDataType::Htable;
    const LABEL: &'static str = "RCA hierarchical table";

    fn set_analysis_date(&mut self, epoch_millis: Option<i64>) {
        self.analysis_date = epoch_millis;
    }
}
