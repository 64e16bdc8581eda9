//! Anomaly model seam.
//!
//! Models are external collaborators invoked by name. The controller hands
//! each one a canonical `(dt, y)` series and receives per-timestamp results.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::series::{AnomalyRecord, SeriesKey, SeriesPoint, SeriesType};

/// Errors raised by model lookup or prediction.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("unknown anomaly model: {0}")]
    UnknownModel(String),

    #[error("model {model} failed: {message}")]
    Failed { model: String, message: String },
}

impl ModelError {
    pub fn failed(model: impl Into<String>, message: impl Into<String>) -> Self {
        ModelError::Failed {
            model: model.into(),
            message: message.into(),
        }
    }
}

/// Everything a model receives for one series.
#[derive(Debug, Clone)]
pub struct ModelInput<'a> {
    pub model_name: &'a str,
    pub series: &'a [SeriesPoint],
    /// Watermark of the series; `None` means process the full history.
    pub last_date: Option<NaiveDateTime>,
    /// Minimum window length.
    pub period: u32,
    pub table_name: &'a str,
    pub series_type: SeriesType,
    /// Subgroup filter string or DQ kind.
    pub subgroup: Option<&'a str>,
    pub model_kwargs: &'a serde_json::Map<String, serde_json::Value>,
}

/// One model result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyPoint {
    pub dt: NaiveDateTime,
    pub y: Option<f64>,
    #[serde(rename = "anomaly")]
    pub is_anomaly: bool,
    /// Model-specific columns such as bounds or severity.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl AnomalyPoint {
    pub fn new(dt: NaiveDateTime, y: Option<f64>, is_anomaly: bool) -> Self {
        Self {
            dt,
            y,
            is_anomaly,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Stamp the point with its stream identity for persistence.
    pub fn into_record(self, key: &SeriesKey) -> AnomalyRecord {
        AnomalyRecord {
            kpi_id: key.kpi_id,
            anomaly_type: key.series_type,
            series_type: key.subgroup.clone(),
            data_datetime: self.dt,
            y: self.y,
            is_anomaly: self.is_anomaly,
            extra: self.extra,
        }
    }
}

/// Anomaly detection model.
///
/// Implementations are expected to emit only rows after `input.last_date`
/// when one is given; the controller discards anything older regardless.
pub trait AnomalyModel: Send + Sync {
    fn predict(&self, input: &ModelInput<'_>) -> Result<Vec<AnomalyPoint>, ModelError>;
}

/// Models addressable by name.
#[derive(Default, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn AnomalyModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, model: Arc<dyn AnomalyModel>) {
        self.models.insert(name.into(), model);
    }

    pub fn with_model(mut self, name: impl Into<String>, model: Arc<dyn AnomalyModel>) -> Self {
        self.register(name, model);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AnomalyModel>> {
        self.models.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Resolve `input.model_name` and run it.
    pub fn predict(&self, input: &ModelInput<'_>) -> Result<Vec<AnomalyPoint>, ModelError> {
        let model = self
            .models
            .get(input.model_name)
            .ok_or_else(|| ModelError::UnknownModel(input.model_name.to_string()))?;
        model.predict(input)
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ModelRegistry").field("models", &names).finish()
    }
}
