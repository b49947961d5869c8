//! In-memory metrics sink for testing.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{destination_table, metric_records, MetricRecord, MetricsSink};
use crate::detector::ProjectChanges;
use crate::error::{MonitorError, Result};

/// Sink that keeps committed writes in memory.
#[derive(Default)]
pub struct MockMetricsSink {
    writes: RwLock<Vec<ProjectChanges>>,
    destinations: RwLock<HashSet<String>>,
    failing_projects: RwLock<HashSet<String>>,
}

impl MockMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes for one project, as if an insert failed.
    pub async fn set_fail_on_project(&self, project: &str, fail: bool) {
        let mut failing = self.failing_projects.write().await;
        if fail {
            failing.insert(project.to_string());
        } else {
            failing.remove(project);
        }
    }

    /// Committed writes, in order.
    pub async fn writes(&self) -> Vec<ProjectChanges> {
        self.writes.read().await.clone()
    }

    /// Committed writes for one project.
    pub async fn writes_for(&self, project: &str) -> Vec<ProjectChanges> {
        self.writes
            .read()
            .await
            .iter()
            .filter(|w| w.project == project)
            .cloned()
            .collect()
    }

    /// Rows committed to one destination table.
    pub async fn records(&self, destination: &str) -> Vec<MetricRecord> {
        self.writes
            .read()
            .await
            .iter()
            .filter(|w| destination_table(&w.project) == destination)
            .flat_map(metric_records)
            .collect()
    }

    pub async fn has_destination(&self, destination: &str) -> bool {
        self.destinations.read().await.contains(destination)
    }
}

#[async_trait]
impl MetricsSink for MockMetricsSink {
    async fn ensure_destination(&self, destination: &str) -> Result<()> {
        self.destinations
            .write()
            .await
            .insert(destination.to_string());
        Ok(())
    }

    async fn write(&self, changes: &ProjectChanges) -> Result<()> {
        if changes.events.is_empty() {
            return Ok(());
        }
        self.ensure_destination(&destination_table(&changes.project))
            .await?;

        if self.failing_projects.read().await.contains(&changes.project) {
            return Err(MonitorError::Query(format!(
                "insert into {} failed",
                destination_table(&changes.project)
            )));
        }

        self.writes.write().await.push(changes.clone());
        Ok(())
    }
}
