//! Unified SQL RCA snapshot store.

use std::marker::PhantomData;

use chrono::NaiveDate;

use super::SqlDatabase;
use crate::storage::rca_store::{DimensionFilter, RcaQuery, RcaRecord};
use crate::storage::schema::{RcaData, DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::storage::{Result, StorageError};

/// SQL-based implementation of RcaReadStore.
pub struct SqlRcaStore<DB: SqlDatabase> {
    pool: DB::Pool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlRcaStore<DB> {
    pub fn new(pool: DB::Pool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }
}

fn latest_statement(query: &RcaQuery) -> sea_query::SelectStatement {
    use sea_query::{Expr, Order, Query};

    let mut stmt = Query::select()
        .columns([
            RcaData::Timeline,
            RcaData::EndDate,
            RcaData::Dimension,
            RcaData::CreatedAt,
            RcaData::Data,
        ])
        .from(RcaData::Table)
        .and_where(Expr::col(RcaData::KpiId).eq(query.kpi_id))
        .and_where(Expr::col(RcaData::DataType).eq(query.data_type.as_str()))
        .and_where(
            Expr::col(RcaData::EndDate).lte(query.end_date.format(DATE_FORMAT).to_string()),
        )
        .order_by(RcaData::CreatedAt, Order::Desc)
        .limit(1)
        .to_owned();

    if let Some(timeline) = &query.timeline {
        stmt.and_where(Expr::col(RcaData::Timeline).eq(timeline.as_str()));
    }

    match &query.dimension {
        DimensionFilter::Any => {}
        DimensionFilter::Overall => {
            stmt.and_where(Expr::col(RcaData::Dimension).is_null());
        }
        DimensionFilter::Named(name) => {
            stmt.and_where(Expr::col(RcaData::Dimension).eq(name.as_str()));
        }
    }

    stmt
}

fn insert_statement(record: &RcaRecord) -> Result<sea_query::InsertStatement> {
    use sea_query::Query;

    let data = serde_json::to_string(&record.data)?;

    Ok(Query::insert()
        .into_table(RcaData::Table)
        .columns([
            RcaData::KpiId,
            RcaData::DataType,
            RcaData::Timeline,
            RcaData::EndDate,
            RcaData::Dimension,
            RcaData::CreatedAt,
            RcaData::Data,
        ])
        .values_panic([
            record.kpi_id.into(),
            record.data_type.as_str().into(),
            record.timeline.as_str().into(),
            record.end_date.format(DATE_FORMAT).to_string().into(),
            record.dimension.clone().into(),
            record.created_at.format(TIMESTAMP_FORMAT).to_string().into(),
            data.into(),
        ])
        .to_owned())
}

fn parse_end_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| StorageError::InvalidTimestamp(raw.to_string()))
}

macro_rules! impl_rca_store {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        impl SqlRcaStore<$db_type> {
            /// Create the RCA table if it does not exist.
            pub async fn init(&self) -> Result<()> {
                for statement in crate::storage::schema::CREATE_RCA_DATA_TABLE {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                Ok(())
            }

            /// Store a computed snapshot.
            pub async fn insert(&self, record: &RcaRecord) -> Result<()> {
                let sql = <$db_type>::build_insert(insert_statement(record)?);
                sqlx::query(&sql).execute(&self.pool).await?;
                Ok(())
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::RcaReadStore for SqlRcaStore<$db_type> {
            async fn latest(&self, query: &RcaQuery) -> Result<Option<RcaRecord>> {
                use sqlx::Row;

                let sql = <$db_type>::build_select(latest_statement(query));
                let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;

                let Some(row) = row else {
                    return Ok(None);
                };

                let end_date: String = row.try_get("end_date")?;
                let created_at: String = row.try_get("created_at")?;
                let data: String = row.try_get("data")?;

                Ok(Some(RcaRecord {
                    kpi_id: query.kpi_id,
                    data_type: query.data_type,
                    timeline: row.try_get("timeline")?,
                    end_date: parse_end_date(&end_date)?,
                    dimension: row.try_get("dimension")?,
                    created_at: crate::series::frame::parse_timestamp_str(&created_at)
                        .ok_or(StorageError::InvalidTimestamp(created_at))?,
                    data: serde_json::from_str(&data)?,
                }))
            }
        }
    };
}

impl_rca_store!(super::postgres::Postgres, "postgres");
impl_rca_store!(super::sqlite::Sqlite, "sqlite");
