//! SQLite snapshot fetcher.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};
use tracing::debug;

use super::{decode_rows, scan_statement, SnapshotFetcher};
use crate::config::{ConnectionConfig, Dialect};
use crate::error::Result;
use crate::snapshot::{CellValue, TableSnapshot};

/// SQLite implementation of SnapshotFetcher.
pub struct SqliteSource {
    pool: SqlitePool,
}

impl SqliteSource {
    /// Create a SQLite source over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database file read-only on first use.
    pub fn connect_lazy(connection: &ConnectionConfig) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(&connection.database)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(options);

        Self::new(pool)
    }
}

#[async_trait]
impl SnapshotFetcher for SqliteSource {
    async fn fetch(&self, table: &str) -> Result<TableSnapshot> {
        let sql = scan_statement(table, Dialect::Sqlite);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        debug!(table, rows = rows.len(), "Scanned SQLite table");
        decode_rows(table, &rows, decode_cell)
    }
}

/// Values are typed by their storage class, not the declared column type.
fn decode_cell(row: &SqliteRow, index: usize) -> std::result::Result<CellValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(CellValue::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => CellValue::Int(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" => CellValue::Float(row.try_get_unchecked::<f64, _>(index)?),
        "TEXT" | "DATE" | "TIME" | "DATETIME" => {
            CellValue::Text(row.try_get_unchecked::<String, _>(index)?)
        }
        _ => CellValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
    };

    Ok(value)
}
