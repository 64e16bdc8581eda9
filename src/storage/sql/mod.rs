//! Unified SQL storage implementations.
//!
//! This module provides shared implementations for SQL-based storage backends
//! (PostgreSQL, SQLite). The implementations are parameterized by database type
//! using the `SqlDatabase` trait.

mod anomaly_store;
mod rca_store;

pub use anomaly_store::SqlAnomalyStore;
pub use rca_store::SqlRcaStore;

/// Backend marker for the SQL stores.
///
/// Statements are built once with sea-query and rendered with the backend's
/// own builder, so identifier quoting and literal escaping always match the
/// target database.
pub trait SqlDatabase: Send + Sync + 'static {
    /// The connection pool type for this database.
    type Pool: Clone + Send + Sync;

    /// Render a SELECT statement for this backend.
    fn build_select(stmt: sea_query::SelectStatement) -> String;

    /// Render an INSERT statement for this backend.
    fn build_insert(stmt: sea_query::InsertStatement) -> String;
}

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL database backend.

    use sea_query::PostgresQueryBuilder;
    use sqlx::PgPool;

    /// PostgreSQL database marker type.
    pub struct Postgres;

    impl super::SqlDatabase for Postgres {
        type Pool = PgPool;

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }
    }

    /// PostgreSQL anomaly output and watermark store.
    pub type PostgresAnomalyStore = super::SqlAnomalyStore<Postgres>;

    /// PostgreSQL RCA snapshot store.
    pub type PostgresRcaStore = super::SqlRcaStore<Postgres>;
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite database backend.

    use sea_query::SqliteQueryBuilder;
    use sqlx::SqlitePool;

    /// SQLite database marker type.
    pub struct Sqlite;

    impl super::SqlDatabase for Sqlite {
        type Pool = SqlitePool;

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }
    }

    /// SQLite anomaly output and watermark store.
    pub type SqliteAnomalyStore = super::SqlAnomalyStore<Sqlite>;

    /// SQLite RCA snapshot store.
    pub type SqliteRcaStore = super::SqlRcaStore<Sqlite>;
}
