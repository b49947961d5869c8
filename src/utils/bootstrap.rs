//! Bootstrap utilities for the tablewatch binary.

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, SinkConfig, LOG_ENV_VAR};
use crate::error::{MonitorError, Result};
use crate::scheduler::{MonitoredProject, PollScheduler};
use crate::sink::{init_sink, MetricsSink};
use crate::source::connect_source;
use crate::store::InMemoryFingerprintStore;
use crate::utils::retry::{connection_backoff, is_retryable};

/// Initialize tracing with TABLEWATCH_LOG environment variable.
///
/// Defaults to "info" level if TABLEWATCH_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect to the sink, retrying while it is unreachable.
pub async fn connect_sink_with_retry(config: &SinkConfig) -> Result<Arc<dyn MetricsSink>> {
    (|| init_sink(config))
        .retry(connection_backoff())
        .when(is_retryable)
        .notify(|err, dur: Duration| {
            warn!(error = %err, delay = ?dur, "Sink connection failed, retrying");
        })
        .await
}

/// Wire sources, fingerprint store and sink into a scheduler.
pub async fn build_scheduler(config: &Config) -> Result<PollScheduler> {
    let sink_config = config
        .sink
        .as_ref()
        .ok_or_else(|| MonitorError::Configuration("no sink configured".to_string()))?;
    let sink = connect_sink_with_retry(sink_config).await?;

    let projects = config
        .projects
        .iter()
        .map(|project| -> Result<MonitoredProject> {
            Ok(MonitoredProject::new(
                project.name.clone(),
                project.tables.clone(),
                connect_source(project)?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    info!(projects = projects.len(), "Monitoring configured");

    Ok(PollScheduler::new(
        projects,
        Arc::new(InMemoryFingerprintStore::new()),
        sink,
        config.poll.interval(),
    ))
}
