//! In-memory connector for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::connector::{ConnectionInfo, ConnectionResolver, ConnectorError, Result, RowFetcher};
use crate::series::frame::RowSet;

/// Resolver and fetcher in one, serving a fixed row set and recording queries.
#[derive(Default)]
pub struct MockConnector {
    connections: RwLock<HashMap<i64, ConnectionInfo>>,
    rows: RwLock<RowSet>,
    queries: RwLock<Vec<(String, String)>>,
    fail_on_fetch: RwLock<bool>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, data_source: i64, info: ConnectionInfo) {
        self.connections.write().await.insert(data_source, info);
    }

    /// Rows returned by every subsequent fetch.
    pub async fn set_rows(&self, rows: RowSet) {
        *self.rows.write().await = rows;
    }

    pub async fn set_fail_on_fetch(&self, fail: bool) {
        *self.fail_on_fetch.write().await = fail;
    }

    /// `(uri, query)` pairs in fetch order.
    pub async fn queries(&self) -> Vec<(String, String)> {
        self.queries.read().await.clone()
    }
}

#[async_trait]
impl ConnectionResolver for MockConnector {
    async fn resolve(&self, data_source: i64) -> Result<ConnectionInfo> {
        self.connections
            .read()
            .await
            .get(&data_source)
            .cloned()
            .ok_or(ConnectorError::UnknownDataSource(data_source))
    }
}

#[async_trait]
impl RowFetcher for MockConnector {
    async fn fetch(&self, uri: &str, query: &str) -> Result<RowSet> {
        self.queries
            .write()
            .await
            .push((uri.to_string(), query.to_string()));

        if *self.fail_on_fetch.read().await {
            return Err(ConnectorError::Connection(format!("{uri} unreachable")));
        }
        Ok(self.rows.read().await.clone())
    }
}
