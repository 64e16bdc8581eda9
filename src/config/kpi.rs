//! KPI definition types.
//!
//! A `KpiConfig` is immutable for the duration of a detection run. Optional
//! fields carry their documented defaults through serde so a KPI definition
//! only has to name its source, columns and aggregation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default resampling frequency.
pub const DEFAULT_FREQ: Frequency = Frequency::Daily;
/// Default minimum window length.
pub const DEFAULT_PERIOD: u32 = 90;
/// Default anomaly model.
pub const DEFAULT_MODEL_NAME: &str = "StdDeviModel";

/// Resampling frequency of a KPI series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Frequency {
    Hourly,
    Daily,
    /// Weeks ending on Sunday, labeled by that Sunday.
    Weekly,
}

impl Frequency {
    /// Width of one resampling bin.
    pub fn step(self) -> Duration {
        match self {
            Frequency::Hourly => Duration::hours(1),
            Frequency::Daily => Duration::days(1),
            Frequency::Weekly => Duration::weeks(1),
        }
    }

    /// Label of the bin containing `ts`: the bin start for hourly and daily
    /// bins, the closing Sunday for weekly ones.
    pub fn bin_label(self, ts: NaiveDateTime) -> NaiveDateTime {
        match self {
            Frequency::Hourly => ts.date().and_hms_opt(ts.hour(), 0, 0).unwrap_or(ts),
            Frequency::Daily => ts.date().and_time(NaiveTime::MIN),
            Frequency::Weekly => {
                let ahead = 6 - i64::from(ts.weekday().num_days_from_monday());
                (ts.date() + Duration::days(ahead)).and_time(NaiveTime::MIN)
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Hourly => "H",
            Frequency::Daily => "D",
            Frequency::Weekly => "W",
        }
    }
}

impl Default for Frequency {
    fn default() -> Self {
        DEFAULT_FREQ
    }
}

impl FromStr for Frequency {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "H" | "h" => Ok(Frequency::Hourly),
            "D" | "d" => Ok(Frequency::Daily),
            "W" | "w" | "W-SUN" => Ok(Frequency::Weekly),
            other => Err(ConfigError::UnsupportedFrequency(other.to_string())),
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Frequency> for String {
    fn from(freq: Frequency) -> Self {
        freq.as_str().to_string()
    }
}

/// Aggregation applied to the metric column within a resampling bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFn {
    Sum,
    Mean,
    Count,
    Max,
    Min,
    Median,
}

impl AggregationFn {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregationFn::Sum => "sum",
            AggregationFn::Mean => "mean",
            AggregationFn::Count => "count",
            AggregationFn::Max => "max",
            AggregationFn::Min => "min",
            AggregationFn::Median => "median",
        }
    }
}

impl fmt::Display for AggregationFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationFn {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(AggregationFn::Sum),
            "mean" => Ok(AggregationFn::Mean),
            "count" => Ok(AggregationFn::Count),
            "max" => Ok(AggregationFn::Max),
            "min" => Ok(AggregationFn::Min),
            "median" => Ok(AggregationFn::Median),
            other => Err(ConfigError::UnsupportedAggregation(other.to_string())),
        }
    }
}

/// A single allowed value in a column filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

/// Parameters for KPIs analysed against a fixed point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticParams {
    /// Fixed end date of the analysis window.
    pub end_date: Option<NaiveDate>,
}

/// KPI definition driving one detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiConfig {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Identifier handed to the connection resolver.
    pub data_source: i64,
    /// Source table, rendered verbatim (may be schema-qualified).
    pub table_name: String,
    pub datetime_column: String,
    pub metric: String,
    pub aggregation: AggregationFn,
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Column name to allowed values. Empty lists are ignored.
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<FilterValue>>,
    #[serde(default)]
    pub freq: Frequency,
    /// Minimum window length, also the history window in days.
    #[serde(default = "default_period")]
    pub period: u32,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default)]
    pub model_kwargs: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub static_params: StaticParams,
}

fn default_period() -> u32 {
    DEFAULT_PERIOD
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

impl KpiConfig {
    /// Create a KPI with defaults for every optional field.
    pub fn new(
        id: i64,
        data_source: i64,
        table_name: impl Into<String>,
        datetime_column: impl Into<String>,
        metric: impl Into<String>,
        aggregation: AggregationFn,
    ) -> Self {
        Self {
            id,
            name: String::new(),
            data_source,
            table_name: table_name.into(),
            datetime_column: datetime_column.into(),
            metric: metric.into(),
            aggregation,
            dimensions: Vec::new(),
            filters: BTreeMap::new(),
            freq: DEFAULT_FREQ,
            period: DEFAULT_PERIOD,
            model_name: default_model_name(),
            model_kwargs: serde_json::Map::new(),
            is_static: false,
            static_params: StaticParams::default(),
        }
    }

    pub fn with_dimensions<I, S>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions = dimensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_period(mut self, period: u32) -> Self {
        self.period = period;
        self
    }

    pub fn with_static_end_date(mut self, end_date: NaiveDate) -> Self {
        self.is_static = true;
        self.static_params.end_date = Some(end_date);
        self
    }

    /// Parse and validate a single KPI definition from YAML.
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let kpi: KpiConfig = serde_yaml::from_str(source)?;
        kpi.validate()?;
        Ok(kpi)
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("table_name", &self.table_name),
            ("datetime_column", &self.datetime_column),
            ("metric", &self.metric),
            ("model_name", &self.model_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField {
                    kpi_id: self.id,
                    field,
                });
            }
        }

        if self.period == 0 {
            return Err(ConfigError::ZeroPeriod { kpi_id: self.id });
        }

        let mut seen = std::collections::HashSet::new();
        for dim in &self.dimensions {
            if !seen.insert(dim.as_str()) {
                return Err(ConfigError::DuplicateDimension {
                    kpi_id: self.id,
                    dimension: dim.clone(),
                });
            }
        }

        Ok(())
    }

    /// Fixed end date for static KPIs, if one is configured.
    pub fn static_end_date(&self) -> Option<NaiveDate> {
        if self.is_static {
            self.static_params.end_date
        } else {
            None
        }
    }
}
