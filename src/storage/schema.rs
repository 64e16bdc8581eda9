//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Format of timestamps stored as text.
///
/// Fixed-width nanoseconds, so the text round-trips exactly and sorts in
/// time order under `MAX()` and `ORDER BY`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";
/// Format of dates stored as text.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Anomaly output table schema.
#[derive(Iden)]
pub enum AnomalyDataOutput {
    #[iden = "anomaly_data_output"]
    Table,
    #[iden = "kpi_id"]
    KpiId,
    #[iden = "anomaly_type"]
    AnomalyType,
    #[iden = "series_type"]
    SeriesType,
    #[iden = "data_datetime"]
    DataDatetime,
    #[iden = "y"]
    Y,
    #[iden = "is_anomaly"]
    IsAnomaly,
    #[iden = "extra"]
    Extra,
    #[iden = "created_at"]
    CreatedAt,
}

/// RCA snapshot table schema.
#[derive(Iden)]
pub enum RcaData {
    #[iden = "rca_data"]
    Table,
    #[iden = "kpi_id"]
    KpiId,
    #[iden = "data_type"]
    DataType,
    #[iden = "timeline"]
    Timeline,
    #[iden = "end_date"]
    EndDate,
    #[iden = "dimension"]
    Dimension,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "data"]
    Data,
}

/// SQL for creating the anomaly output table, one statement per entry.
pub const CREATE_ANOMALY_OUTPUT_TABLE: [&str; 2] = [
    r#"
CREATE TABLE IF NOT EXISTS anomaly_data_output (
    kpi_id BIGINT NOT NULL,
    anomaly_type TEXT NOT NULL,
    series_type TEXT,
    data_datetime TEXT NOT NULL,
    y DOUBLE PRECISION,
    is_anomaly INTEGER NOT NULL DEFAULT 0,
    extra TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
)"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_anomaly_output_series
    ON anomaly_data_output(kpi_id, anomaly_type, series_type, data_datetime)"#,
];

/// SQL for creating the RCA snapshot table, one statement per entry.
pub const CREATE_RCA_DATA_TABLE: [&str; 2] = [
    r#"
CREATE TABLE IF NOT EXISTS rca_data (
    kpi_id BIGINT NOT NULL,
    data_type TEXT NOT NULL,
    timeline TEXT NOT NULL,
    end_date TEXT NOT NULL,
    dimension TEXT,
    created_at TEXT NOT NULL,
    data TEXT NOT NULL
)"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_rca_data_lookup
    ON rca_data(kpi_id, data_type, timeline, end_date)"#,
];
