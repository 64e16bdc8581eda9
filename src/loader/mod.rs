//! Raw KPI data loading.
//!
//! `DataLoader` resolves a KPI's data source, renders a bounded source query,
//! fetches rows through the external connector and shapes them into a
//! `RawSeriesFrame`.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

mod connector;
mod query;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use connector::{
    ConnectionInfo, ConnectionKind, ConnectionResolver, ConnectorError, RowFetcher,
};
pub use query::SourceQuery;

use crate::config::KpiConfig;
use crate::series::frame::{FrameError, RawSeriesFrame};

/// Errors raised while loading raw KPI rows.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Date bounds of a load: rows with `base_date < dt <= end_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadWindow {
    pub base_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl LoadWindow {
    /// Window of `days` days ending at `end_date`.
    pub fn ending(end_date: NaiveDate, days: u32) -> Self {
        Self {
            base_date: end_date - Duration::days(i64::from(days)),
            end_date,
        }
    }
}

/// Loads raw observations for KPIs through injected connector collaborators.
pub struct DataLoader {
    resolver: Arc<dyn ConnectionResolver>,
    fetcher: Arc<dyn RowFetcher>,
}

impl DataLoader {
    pub fn new(resolver: Arc<dyn ConnectionResolver>, fetcher: Arc<dyn RowFetcher>) -> Self {
        Self { resolver, fetcher }
    }

    /// Load `kpi.period` days of rows ending at `end_date`.
    pub async fn load(
        &self,
        kpi: &KpiConfig,
        end_date: NaiveDate,
    ) -> Result<RawSeriesFrame, LoadError> {
        self.load_window(kpi, LoadWindow::ending(end_date, kpi.period))
            .await
    }

    pub async fn load_window(
        &self,
        kpi: &KpiConfig,
        window: LoadWindow,
    ) -> Result<RawSeriesFrame, LoadError> {
        let connection = self.resolver.resolve(kpi.data_source).await?;
        let query =
            SourceQuery::for_kpi(&connection.kind, kpi, window.base_date, window.end_date)
                .render();

        debug!(
            kpi_id = kpi.id,
            connection_kind = %connection.kind,
            query = %query,
            "Fetching source rows"
        );

        let rows = self.fetcher.fetch(&connection.uri, &query).await?;
        let fetched = rows.row_count();

        let mut frame = RawSeriesFrame::from_row_set(&rows, kpi)?;
        frame.retain_window(window.base_date, window.end_date);

        info!(
            kpi_id = kpi.id,
            base_date = %window.base_date,
            end_date = %window.end_date,
            fetched,
            retained = frame.len(),
            "Loaded source rows"
        );

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::mock::MockConnector;
    use super::*;
    use crate::config::{AggregationFn, FilterValue};
    use crate::series::frame::RowSet;

    fn kpi() -> KpiConfig {
        let mut kpi = KpiConfig::new(5, 2, "orders", "day", "amount", AggregationFn::Sum)
            .with_dimensions(["region"])
            .with_period(3);
        kpi.filters
            .insert("region".to_string(), vec![FilterValue::from("us")]);
        kpi
    }

    fn rows() -> RowSet {
        let mut rows = RowSet::new(vec!["day".into(), "amount".into(), "region".into()]);
        for (day, amount) in [
            ("2023-04-07", 1),
            ("2023-04-08", 2),
            ("2023-04-09", 3),
            ("2023-04-10", 4),
            ("2023-04-11", 5),
        ] {
            rows.push(vec![json!(day), json!(amount), json!("us")]);
        }
        rows
    }

    #[tokio::test]
    async fn test_load_renders_window_and_trims_rows() {
        let connector = Arc::new(MockConnector::new());
        connector
            .register(2, ConnectionInfo::new("mysql", "mysql://source/db"))
            .await;
        connector.set_rows(rows()).await;

        let loader = DataLoader::new(connector.clone(), connector.clone());
        let end = NaiveDate::from_ymd_opt(2023, 4, 10).unwrap();
        let frame = loader.load(&kpi(), end).await.unwrap();

        // Rows outside (2023-04-07, 2023-04-10] are dropped even if the source returns them.
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.dimensions, vec!["region".to_string()]);

        let queries = connector.queries().await;
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].0, "mysql://source/db");
        assert_eq!(
            queries[0].1,
            "select * from orders where `day` > '2023-04-07' and `day` <= '2023-04-10' \
             and `region` in ('us')"
        );
    }

    #[tokio::test]
    async fn test_load_propagates_unknown_source() {
        let connector = Arc::new(MockConnector::new());
        let loader = DataLoader::new(connector.clone(), connector);
        let end = NaiveDate::from_ymd_opt(2023, 4, 10).unwrap();

        let err = loader.load(&kpi(), end).await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Connector(ConnectorError::UnknownDataSource(2))
        ));
    }

    #[tokio::test]
    async fn test_load_rejects_missing_metric_column() {
        let connector = Arc::new(MockConnector::new());
        connector
            .register(2, ConnectionInfo::new("postgresql", "postgres://source/db"))
            .await;
        connector
            .set_rows(RowSet::new(vec!["day".into(), "region".into()]))
            .await;

        let loader = DataLoader::new(connector.clone(), connector);
        let end = NaiveDate::from_ymd_opt(2023, 4, 10).unwrap();
        let err = loader.load(&kpi(), end).await.unwrap_err();
        assert!(matches!(err, LoadError::Frame(FrameError::MissingColumn(c)) if c == "amount"));
    }
}
