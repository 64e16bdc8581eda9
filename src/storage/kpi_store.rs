//! KpiStore trait definition.

use std::collections::HashMap;

use async_trait::async_trait;

use super::Result;
use crate::config::KpiConfig;

/// Source of KPI definitions for the read paths.
#[async_trait]
pub trait KpiStore: Send + Sync {
    /// Returns `None` if the KPI is unknown.
    async fn get(&self, kpi_id: i64) -> Result<Option<KpiConfig>>;
}

/// KPI definitions taken from loaded configuration.
#[derive(Debug, Default)]
pub struct ConfiguredKpis {
    kpis: HashMap<i64, KpiConfig>,
}

impl ConfiguredKpis {
    pub fn new(kpis: impl IntoIterator<Item = KpiConfig>) -> Self {
        Self {
            kpis: kpis.into_iter().map(|k| (k.id, k)).collect(),
        }
    }
}

#[async_trait]
impl KpiStore for ConfiguredKpis {
    async fn get(&self, kpi_id: i64) -> Result<Option<KpiConfig>> {
        Ok(self.kpis.get(&kpi_id).cloned())
    }
}
