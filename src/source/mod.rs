//! Snapshot fetchers: full-table scans against monitored databases.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Column, Row};
use tracing::{error, info};

use crate::config::{Dialect, ProjectConfig};
use crate::error::{MonitorError, Result};
use crate::snapshot::{CellValue, TableRow, TableSnapshot};

pub mod mock;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mysql")]
pub use mysql::MysqlSource;

#[cfg(feature = "postgres")]
pub use postgres::PostgresSource;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSource;

/// Reads the full current content of a table from one data source.
///
/// Implementations:
/// - `MysqlSource`: MySQL, unquoted table names
/// - `PostgresSource`: PostgreSQL, quoted table names
/// - `SqliteSource`: SQLite file databases, quoted table names
/// - `mock::MockSource`: in-memory tables for tests
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Scan every row of `table`.
    ///
    /// All or nothing: on error no partial snapshot is returned.
    async fn fetch(&self, table: &str) -> Result<TableSnapshot>;
}

/// Build the full-scan statement for a table.
pub fn scan_statement(table: &str, dialect: Dialect) -> String {
    if dialect.quotes_identifiers() {
        format!("SELECT * FROM \"{}\"", table.replace('"', "\"\""))
    } else {
        format!("SELECT * FROM {table}")
    }
}

/// Convert driver rows into a snapshot, preserving row and column order.
pub(crate) fn decode_rows<R, F>(table: &str, rows: &[R], decode_cell: F) -> Result<TableSnapshot>
where
    R: Row,
    F: Fn(&R, usize) -> std::result::Result<CellValue, sqlx::Error>,
{
    let mut snapshot = TableSnapshot::with_capacity(rows.len());

    for row in rows {
        let mut cells = TableRow::with_capacity(row.columns().len());
        for column in row.columns() {
            let value =
                decode_cell(row, column.ordinal()).map_err(|e| MonitorError::Decode {
                    table: table.to_string(),
                    column: column.name().to_string(),
                    reason: e.to_string(),
                })?;
            cells.insert(column.name().to_string(), value);
        }
        snapshot.push(cells);
    }

    Ok(snapshot)
}

/// Create the fetcher for a configured project.
///
/// Connections are established lazily on the first scan, so an unreachable
/// source surfaces as a `Connection` error during its project's poll.
pub fn connect_source(project: &ProjectConfig) -> Result<Arc<dyn SnapshotFetcher>> {
    info!(
        project = %project.name,
        dialect = %project.dialect,
        host = %project.connection.host,
        database = %project.connection.database,
        "Source configured"
    );

    match project.dialect {
        #[cfg(feature = "mysql")]
        Dialect::Mysql => Ok(Arc::new(MysqlSource::connect_lazy(&project.connection))),
        #[cfg(feature = "postgres")]
        Dialect::Postgres => Ok(Arc::new(PostgresSource::connect_lazy(&project.connection))),
        #[cfg(feature = "sqlite")]
        Dialect::Sqlite => Ok(Arc::new(SqliteSource::connect_lazy(&project.connection))),
        #[allow(unreachable_patterns)]
        other => {
            error!(project = %project.name, dialect = %other, "Dialect support not compiled in");
            Err(MonitorError::Configuration(format!(
                "{other} feature not enabled (project {})",
                project.name
            )))
        }
    }
}
