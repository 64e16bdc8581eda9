//! Persistence for anomaly output and RCA snapshots.
//!
//! Traits live next to their record types; `sql` implements them for the
//! SQL backends and `mock` keeps everything in memory for tests.

use std::sync::Arc;

use tracing::info;

mod kpi_store;
mod output_store;
mod rca_store;
mod watermark_store;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod schema;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod sql;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use kpi_store::{ConfiguredKpis, KpiStore};
pub use output_store::OutputStore;
pub use rca_store::{DimensionFilter, RcaDataType, RcaQuery, RcaReadStore, RcaRecord};
pub use watermark_store::WatermarkStore;

#[cfg(feature = "postgres")]
pub use sql::postgres::{PostgresAnomalyStore, PostgresRcaStore};
#[cfg(feature = "sqlite")]
pub use sql::sqlite::{SqliteAnomalyStore, SqliteRcaStore};

use crate::config::{StorageConfig, StorageType};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid stored timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend not enabled: {0}")]
    BackendDisabled(StorageType),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Stores built from configuration.
pub struct Stores {
    pub watermarks: Arc<dyn WatermarkStore>,
    pub output: Arc<dyn OutputStore>,
    pub rca: Arc<dyn RcaReadStore>,
}

/// Initialize storage based on configuration.
///
/// Connects, creates missing tables, and returns the anomaly store (serving
/// both watermarks and output) alongside the RCA store.
pub async fn init_storage(config: &StorageConfig) -> Result<Stores> {
    info!(storage_type = %config.storage_type, "Initializing storage");

    match config.storage_type {
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            if config.sqlite.path != ":memory:" {
                if let Some(parent) = std::path::Path::new(&config.sqlite.path).parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| StorageError::Unavailable(e.to_string()))?;
                }
            }

            // A single connection keeps `:memory:` databases shared.
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(1)
                .connect(&config.sqlite.connection_uri())
                .await?;

            let anomaly_store = Arc::new(SqliteAnomalyStore::new(pool.clone()));
            anomaly_store.init().await?;

            let rca_store = Arc::new(SqliteRcaStore::new(pool));
            rca_store.init().await?;

            Ok(Stores {
                watermarks: anomaly_store.clone(),
                output: anomaly_store,
                rca: rca_store,
            })
        }
        #[cfg(feature = "postgres")]
        StorageType::Postgres => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.postgres.max_connections)
                .connect(&config.postgres.uri)
                .await?;

            let anomaly_store = Arc::new(PostgresAnomalyStore::new(pool.clone()));
            anomaly_store.init().await?;

            let rca_store = Arc::new(PostgresRcaStore::new(pool));
            rca_store.init().await?;

            Ok(Stores {
                watermarks: anomaly_store.clone(),
                output: anomaly_store,
                rca: rca_store,
            })
        }
        #[allow(unreachable_patterns)]
        ref other => {
            tracing::error!(storage_type = %other, "Storage backend requested but its feature is not enabled");
            Err(StorageError::BackendDisabled(other.clone()))
        }
    }
}
