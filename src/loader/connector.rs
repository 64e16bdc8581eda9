//! Collaborator traits for reaching a KPI's source database.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::series::frame::RowSet;

/// Result type for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Errors surfaced by connection resolution or row retrieval.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// No connection is registered for the data source.
    #[error("unknown data source: {0}")]
    UnknownDataSource(i64),

    /// The source could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The source rejected or failed the query.
    #[error("query failed: {0}")]
    Query(String),
}

/// Kind of source database, deciding identifier quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConnectionKind {
    Mysql,
    Postgresql,
    /// Any other source; identifiers are left unquoted.
    Other(String),
}

impl ConnectionKind {
    /// Character wrapping identifiers in source queries.
    pub fn identifier_quote(&self) -> Option<char> {
        match self {
            ConnectionKind::Mysql => Some('`'),
            ConnectionKind::Postgresql => Some('"'),
            ConnectionKind::Other(_) => None,
        }
    }

    /// Whether backslashes are escape characters inside string literals.
    pub fn backslash_escapes(&self) -> bool {
        matches!(self, ConnectionKind::Mysql)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConnectionKind::Mysql => "mysql",
            ConnectionKind::Postgresql => "postgresql",
            ConnectionKind::Other(name) => name,
        }
    }
}

impl From<String> for ConnectionKind {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "mysql" => ConnectionKind::Mysql,
            "postgresql" | "postgres" => ConnectionKind::Postgresql,
            _ => ConnectionKind::Other(name),
        }
    }
}

impl From<&str> for ConnectionKind {
    fn from(name: &str) -> Self {
        ConnectionKind::from(name.to_string())
    }
}

impl From<ConnectionKind> for String {
    fn from(kind: ConnectionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection metadata for one data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub kind: ConnectionKind,
    pub uri: String,
}

impl ConnectionInfo {
    pub fn new(kind: impl Into<ConnectionKind>, uri: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            uri: uri.into(),
        }
    }
}

/// Resolves a KPI's data source id to connection metadata.
#[async_trait]
pub trait ConnectionResolver: Send + Sync {
    async fn resolve(&self, data_source: i64) -> Result<ConnectionInfo>;
}

/// Executes a query against a source and returns the raw rows.
#[async_trait]
pub trait RowFetcher: Send + Sync {
    async fn fetch(&self, uri: &str, query: &str) -> Result<RowSet>;
}
