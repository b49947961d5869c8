//! Fixed-interval poll loop.
//!
//! Each cycle captures the current time once, then visits every project in
//! configured order: detect changes, write them to the sink, then save the new
//! fingerprints. Projects are isolated: a failure is logged and the cycle
//! moves on to the next project, whose unsaved changes are reported again on
//! the next cycle.
//! The loop stops when the shutdown signal flips to `true`, checked between
//! projects and raced against the inter-cycle sleep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::detector::ChangeDetector;
use crate::error::{MonitorError, Result};
use crate::sink::MetricsSink;
use crate::source::SnapshotFetcher;
use crate::store::FingerprintStore;

/// A project ready to be polled.
pub struct MonitoredProject {
    pub name: String,
    pub tables: Vec<String>,
    pub source: Arc<dyn SnapshotFetcher>,
}

impl MonitoredProject {
    pub fn new(name: impl Into<String>, tables: Vec<String>, source: Arc<dyn SnapshotFetcher>) -> Self {
        Self {
            name: name.into(),
            tables,
            source,
        }
    }
}

/// What happened to one project in one cycle.
#[derive(Debug)]
pub enum ProjectOutcome {
    /// Changes were committed to the sink.
    Written { events: usize },
    /// No table changed; nothing was written.
    Unchanged,
    /// Detection or the sink write failed; nothing was committed.
    Failed(MonitorError),
}

/// Result of one cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub detected_at: DateTime<Utc>,
    /// One entry per visited project, in visit order.
    pub outcomes: Vec<(String, ProjectOutcome)>,
}

impl CycleReport {
    pub fn outcome(&self, project: &str) -> Option<&ProjectOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == project)
            .map(|(_, outcome)| outcome)
    }

    /// Total events written across projects.
    pub fn events_written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                ProjectOutcome::Written { events } => *events,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ProjectOutcome::Failed(_)))
            .count()
    }
}

/// Drives poll cycles over all configured projects.
pub struct PollScheduler {
    projects: Vec<MonitoredProject>,
    detector: ChangeDetector,
    sink: Arc<dyn MetricsSink>,
    interval: Duration,
}

impl PollScheduler {
    pub fn new(
        projects: Vec<MonitoredProject>,
        store: Arc<dyn FingerprintStore>,
        sink: Arc<dyn MetricsSink>,
        interval: Duration,
    ) -> Self {
        Self {
            projects,
            detector: ChangeDetector::new(store),
            sink,
            interval,
        }
    }

    /// Run cycles until `shutdown` becomes `true` or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            projects = self.projects.len(),
            interval_secs = self.interval.as_secs(),
            "Poll scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.cycle(Utc::now(), Some(&shutdown)).await;
            info!(
                projects = report.outcomes.len(),
                events = report.events_written(),
                failures = report.failures(),
                "Cycle complete"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Poll scheduler stopped");
    }

    /// Run a single cycle over every project, stamped with `detected_at`.
    pub async fn run_cycle(&self, detected_at: DateTime<Utc>) -> CycleReport {
        self.cycle(detected_at, None).await
    }

    async fn cycle(
        &self,
        detected_at: DateTime<Utc>,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> CycleReport {
        let mut outcomes = Vec::with_capacity(self.projects.len());

        for project in &self.projects {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                warn!(project = %project.name, "Shutdown requested, ending cycle early");
                break;
            }

            let outcome = match self.poll_project(project, detected_at).await {
                Ok(Some(events)) => ProjectOutcome::Written { events },
                Ok(None) => ProjectOutcome::Unchanged,
                Err(e) => {
                    error!(project = %project.name, error = %e, "Project poll failed");
                    ProjectOutcome::Failed(e)
                }
            };
            outcomes.push((project.name.clone(), outcome));
        }

        CycleReport {
            detected_at,
            outcomes,
        }
    }

    async fn poll_project(
        &self,
        project: &MonitoredProject,
        detected_at: DateTime<Utc>,
    ) -> Result<Option<usize>> {
        let changes = self
            .detector
            .detect(
                &project.name,
                &project.tables,
                project.source.as_ref(),
                detected_at,
            )
            .await?;

        match changes {
            Some(changes) => {
                self.sink.write(&changes).await?;
                self.detector.commit(&changes).await?;
                Ok(Some(changes.events.len()))
            }
            None => Ok(None),
        }
    }
}
