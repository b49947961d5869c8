//! Metrics sink: persists each project's update events to a central database.
//!
//! Every project gets its own destination table, named from the project name,
//! created on first use. All rows of one project-cycle commit together.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::{Dialect, SinkConfig};
use crate::detector::ProjectChanges;
use crate::error::{MonitorError, Result};

pub mod mock;
pub mod schema;
pub mod sql;

#[cfg(feature = "mysql")]
pub use sql::mysql::MysqlMetricsSink;
#[cfg(feature = "postgres")]
pub use sql::postgres::PostgresMetricsSink;
#[cfg(feature = "sqlite")]
pub use sql::sqlite::SqliteMetricsSink;
pub use sql::SqlMetricsSink;

/// Namespace prefix of destination tables.
pub const DESTINATION_PREFIX: &str = "update_metrics_";

/// Format of timestamp columns written to the sink.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of the `day` column.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Destination table for a project: prefix + lowercased name, spaces as underscores.
pub fn destination_table(project: &str) -> String {
    format!(
        "{}{}",
        DESTINATION_PREFIX,
        project.to_lowercase().replace(' ', "_")
    )
}

/// Interface for metrics persistence.
///
/// Implementations:
/// - `SqlMetricsSink<DB>`: MySQL, PostgreSQL or SQLite destination
/// - `mock::MockMetricsSink`: in-memory, for tests
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Create the destination table if it does not exist yet.
    async fn ensure_destination(&self, destination: &str) -> Result<()>;

    /// Insert one row per event, committing all of them or none.
    async fn write(&self, changes: &ProjectChanges) -> Result<()>;
}

/// One destination row, flattened from an event and its project summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRecord {
    pub project_name: String,
    pub table_name: String,
    pub update_count: i64,
    pub last_updated: String,
    pub top_user: Option<String>,
    pub top_user_count: i64,
    pub total_users: i64,
    pub detected_timestamp: String,
    pub day: String,
    pub weekday: i32,
    pub month: i32,
}

fn clamp(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Flatten a project's changes into destination rows, in event order.
pub fn metric_records(changes: &ProjectChanges) -> Vec<MetricRecord> {
    let detected_timestamp = changes.detected_at.format(TIMESTAMP_FORMAT).to_string();
    let total_users = clamp(changes.summary.total_users as u64);

    changes
        .events
        .iter()
        .map(|event| MetricRecord {
            project_name: changes.project.clone(),
            table_name: event.table_name.clone(),
            update_count: clamp(event.update_count),
            last_updated: event.last_updated.format(TIMESTAMP_FORMAT).to_string(),
            top_user: event.top_user.clone(),
            top_user_count: clamp(event.top_user_count),
            total_users,
            detected_timestamp: detected_timestamp.clone(),
            day: event.day.format(DAY_FORMAT).to_string(),
            weekday: event.weekday as i32,
            month: event.month as i32,
        })
        .collect()
}

/// Connect to the configured sink.
pub async fn init_sink(config: &SinkConfig) -> Result<Arc<dyn MetricsSink>> {
    let conn = &config.connection;
    info!(
        dialect = %config.dialect,
        host = %conn.host,
        database = %conn.database,
        "Connecting to metrics sink"
    );

    match config.dialect {
        #[cfg(feature = "mysql")]
        Dialect::Mysql => {
            let options = sqlx::mysql::MySqlConnectOptions::new()
                .host(&conn.host)
                .port(conn.port_or_default(Dialect::Mysql))
                .username(&conn.user)
                .password(&conn.password)
                .database(&conn.database);
            let pool = sqlx::mysql::MySqlPoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await?;
            Ok(Arc::new(MysqlMetricsSink::new(pool)))
        }
        #[cfg(feature = "postgres")]
        Dialect::Postgres => {
            let options = sqlx::postgres::PgConnectOptions::new()
                .host(&conn.host)
                .port(conn.port_or_default(Dialect::Postgres))
                .username(&conn.user)
                .password(&conn.password)
                .database(&conn.database);
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await?;
            Ok(Arc::new(PostgresMetricsSink::new(pool)))
        }
        #[cfg(feature = "sqlite")]
        Dialect::Sqlite => {
            let options = sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&conn.database)
                .create_if_missing(true);
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await?;
            Ok(Arc::new(SqliteMetricsSink::new(pool)))
        }
        #[allow(unreachable_patterns)]
        other => {
            error!(dialect = %other, "Sink dialect support not compiled in");
            Err(MonitorError::Configuration(format!(
                "{other} feature not enabled"
            )))
        }
    }
}
