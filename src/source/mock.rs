//! In-memory source for testing.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SnapshotFetcher;
use crate::error::{MonitorError, Result};
use crate::snapshot::{TableRow, TableSnapshot};

/// Source whose tables are plain in-memory snapshots.
#[derive(Default)]
pub struct MockSource {
    tables: RwLock<HashMap<String, TableSnapshot>>,
    failing_tables: RwLock<HashSet<String>>,
    unreachable: RwLock<bool>,
    scans: RwLock<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a table's content.
    pub async fn set_table(&self, table: &str, snapshot: TableSnapshot) {
        self.tables
            .write()
            .await
            .insert(table.to_string(), snapshot);
    }

    /// Append a row to a table, creating the table if needed.
    pub async fn push_row(&self, table: &str, row: TableRow) {
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Make scans of one table fail with a query error.
    pub async fn set_fail_on_table(&self, table: &str, fail: bool) {
        let mut failing = self.failing_tables.write().await;
        if fail {
            failing.insert(table.to_string());
        } else {
            failing.remove(table);
        }
    }

    /// Make every scan fail with a connection error.
    pub async fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.write().await = unreachable;
    }

    /// Tables scanned so far, in order.
    pub async fn scans(&self) -> Vec<String> {
        self.scans.read().await.clone()
    }
}

#[async_trait]
impl SnapshotFetcher for MockSource {
    async fn fetch(&self, table: &str) -> Result<TableSnapshot> {
        if *self.unreachable.read().await {
            return Err(MonitorError::Connection("source unreachable".to_string()));
        }
        self.scans.write().await.push(table.to_string());

        if self.failing_tables.read().await.contains(table) {
            return Err(MonitorError::Query(format!("scan of {table} failed")));
        }

        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .ok_or_else(|| MonitorError::Query(format!("table {table} does not exist")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::row;

    #[tokio::test]
    async fn test_fetch_returns_rows_in_order() {
        let source = MockSource::new();
        source.push_row("drivers", row([("name", "Ann")])).await;
        source.push_row("drivers", row([("name", "Raj")])).await;

        let snapshot = source.fetch("drivers").await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.rows()[1]["name"], "Raj".into());
        assert_eq!(source.scans().await, vec!["drivers"]);
    }

    #[tokio::test]
    async fn test_missing_table_is_query_error() {
        let source = MockSource::new();
        let err = source.fetch("ghost").await.unwrap_err();
        assert!(matches!(err, MonitorError::Query(_)));
    }

    #[tokio::test]
    async fn test_unreachable_is_connection_error() {
        let source = MockSource::new();
        source.set_table("t", TableSnapshot::default()).await;
        source.set_unreachable(true).await;

        assert!(source.fetch("t").await.unwrap_err().is_connection());
    }
}
