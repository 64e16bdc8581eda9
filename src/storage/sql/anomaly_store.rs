//! Unified SQL anomaly output store.
//!
//! The output table doubles as the watermark source: a stream's watermark is
//! the maximum `data_datetime` persisted under its key. Uses a macro to
//! generate implementations for each SQL backend.

use std::marker::PhantomData;

use chrono::NaiveDateTime;

use super::SqlDatabase;
use crate::series::{AnomalyRecord, SeriesKey};
use crate::storage::schema::{AnomalyDataOutput, TIMESTAMP_FORMAT};
use crate::storage::{Result, StorageError};

/// SQL-based implementation of WatermarkStore and OutputStore.
pub struct SqlAnomalyStore<DB: SqlDatabase> {
    pool: DB::Pool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlAnomalyStore<DB> {
    /// Create a new SQL anomaly store with the given pool.
    pub fn new(pool: DB::Pool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }
}

/// Filter a statement down to one stream. A missing subgroup matches NULL.
fn where_series(
    mut stmt: sea_query::SelectStatement,
    key: &SeriesKey,
) -> sea_query::SelectStatement {
    use sea_query::Expr;

    stmt.and_where(Expr::col(AnomalyDataOutput::KpiId).eq(key.kpi_id))
        .and_where(Expr::col(AnomalyDataOutput::AnomalyType).eq(key.series_type.as_str()));
    match key.subgroup() {
        Some(subgroup) => stmt.and_where(Expr::col(AnomalyDataOutput::SeriesType).eq(subgroup)),
        None => stmt.and_where(Expr::col(AnomalyDataOutput::SeriesType).is_null()),
    };
    stmt
}

fn series_statement(key: &SeriesKey) -> sea_query::SelectStatement {
    use sea_query::{Order, Query};

    where_series(
        Query::select()
            .columns([
                AnomalyDataOutput::DataDatetime,
                AnomalyDataOutput::Y,
                AnomalyDataOutput::IsAnomaly,
                AnomalyDataOutput::Extra,
            ])
            .from(AnomalyDataOutput::Table)
            .order_by(AnomalyDataOutput::DataDatetime, Order::Asc)
            .to_owned(),
        key,
    )
}

fn watermark_statement(key: &SeriesKey) -> sea_query::SelectStatement {
    use sea_query::{Expr, Query};

    where_series(
        Query::select()
            .expr(Expr::col(AnomalyDataOutput::DataDatetime).max())
            .from(AnomalyDataOutput::Table)
            .to_owned(),
        key,
    )
}

fn parse_stored_timestamp(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|_| StorageError::InvalidTimestamp(raw.to_string()))
}

fn insert_statement(records: &[AnomalyRecord]) -> Result<sea_query::InsertStatement> {
    use sea_query::Query;

    let created_at = chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string();

    let mut stmt = Query::insert()
        .into_table(AnomalyDataOutput::Table)
        .columns([
            AnomalyDataOutput::KpiId,
            AnomalyDataOutput::AnomalyType,
            AnomalyDataOutput::SeriesType,
            AnomalyDataOutput::DataDatetime,
            AnomalyDataOutput::Y,
            AnomalyDataOutput::IsAnomaly,
            AnomalyDataOutput::Extra,
            AnomalyDataOutput::CreatedAt,
        ])
        .to_owned();

    for record in records {
        let extra = serde_json::to_string(&record.extra)?;
        stmt.values_panic([
            record.kpi_id.into(),
            record.anomaly_type.as_str().into(),
            record.series_type.clone().into(),
            record
                .data_datetime
                .format(TIMESTAMP_FORMAT)
                .to_string()
                .into(),
            record.y.filter(|y| y.is_finite()).into(),
            i32::from(record.is_anomaly).into(),
            extra.into(),
            created_at.clone().into(),
        ]);
    }

    Ok(stmt)
}

/// Macro to implement the anomaly store traits for a specific SQL backend.
///
/// This eliminates duplication between PostgreSQL and SQLite implementations
/// while maintaining full type safety.
macro_rules! impl_anomaly_store {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        impl SqlAnomalyStore<$db_type> {
            /// Create the output table if it does not exist.
            pub async fn init(&self) -> Result<()> {
                for statement in crate::storage::schema::CREATE_ANOMALY_OUTPUT_TABLE {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                Ok(())
            }

            /// Every persisted record of one stream, oldest first.
            pub async fn fetch_series(&self, key: &SeriesKey) -> Result<Vec<AnomalyRecord>> {
                use sqlx::Row;

                let sql = <$db_type>::build_select(series_statement(key));
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

                rows.into_iter()
                    .map(|row| -> Result<AnomalyRecord> {
                        let data_datetime: String = row.try_get("data_datetime")?;
                        let is_anomaly: i32 = row.try_get("is_anomaly")?;
                        let extra: String = row.try_get("extra")?;
                        Ok(AnomalyRecord {
                            kpi_id: key.kpi_id,
                            anomaly_type: key.series_type,
                            series_type: key.subgroup.clone(),
                            data_datetime: parse_stored_timestamp(&data_datetime)?,
                            y: row.try_get("y")?,
                            is_anomaly: is_anomaly != 0,
                            extra: serde_json::from_str(&extra)?,
                        })
                    })
                    .collect()
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::WatermarkStore for SqlAnomalyStore<$db_type> {
            async fn last_timestamp(
                &self,
                kpi_id: i64,
                series_type: crate::series::SeriesType,
                subgroup: Option<&str>,
            ) -> Result<Option<NaiveDateTime>> {
                use sqlx::Row;

                let key = SeriesKey {
                    kpi_id,
                    series_type,
                    subgroup: subgroup.map(str::to_string),
                };

                let sql = <$db_type>::build_select(watermark_statement(&key));
                let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;

                match row {
                    Some(row) => {
                        let latest: Option<String> = row.try_get(0)?;
                        latest.as_deref().map(parse_stored_timestamp).transpose()
                    }
                    None => Ok(None),
                }
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::OutputStore for SqlAnomalyStore<$db_type> {
            async fn append(&self, records: &[AnomalyRecord]) -> Result<()> {
                if records.is_empty() {
                    return Ok(());
                }

                let sql = <$db_type>::build_insert(insert_statement(records)?);
                sqlx::query(&sql).execute(&self.pool).await?;

                Ok(())
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_anomaly_store!(super::postgres::Postgres, "postgres");
impl_anomaly_store!(super::sqlite::Sqlite, "sqlite");
