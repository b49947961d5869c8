//! MySQL snapshot fetcher.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Row, TypeInfo, ValueRef};
use tracing::debug;

use super::{decode_rows, scan_statement, SnapshotFetcher};
use crate::config::{ConnectionConfig, Dialect};
use crate::error::Result;
use crate::snapshot::{CellValue, TableSnapshot};

/// MySQL implementation of SnapshotFetcher.
pub struct MysqlSource {
    pool: MySqlPool,
}

impl MysqlSource {
    /// Create a MySQL source over an existing pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Create a source that connects on first use, one connection at a time.
    pub fn connect_lazy(connection: &ConnectionConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&connection.host)
            .port(connection.port_or_default(Dialect::Mysql))
            .username(&connection.user)
            .password(&connection.password)
            .database(&connection.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(options);

        Self::new(pool)
    }
}

#[async_trait]
impl SnapshotFetcher for MysqlSource {
    async fn fetch(&self, table: &str) -> Result<TableSnapshot> {
        let sql = scan_statement(table, Dialect::Mysql);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        debug!(table, rows = rows.len(), "Scanned MySQL table");
        decode_rows(table, &rows, decode_cell)
    }
}

fn decode_cell(row: &MySqlRow, index: usize) -> std::result::Result<CellValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(CellValue::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "BOOLEAN" => CellValue::Bool(row.try_get(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            CellValue::Int(row.try_get_unchecked::<i64, _>(index)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => CellValue::UInt(row.try_get_unchecked::<u64, _>(index)?),
        "FLOAT" => CellValue::Float(f64::from(row.try_get::<f32, _>(index)?)),
        "DOUBLE" => CellValue::Float(row.try_get(index)?),
        "DECIMAL" | "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT"
        | "ENUM" | "SET" | "JSON" => CellValue::Text(row.try_get_unchecked::<String, _>(index)?),
        "DATETIME" | "TIMESTAMP" => CellValue::Timestamp(row.try_get::<NaiveDateTime, _>(index)?),
        "DATE" => CellValue::Date(row.try_get::<NaiveDate, _>(index)?),
        "TIME" => match row.try_get::<NaiveTime, _>(index) {
            Ok(time) => CellValue::Time(time),
            // Durations outside a day (or negative) have no NaiveTime form.
            Err(_) => CellValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        },
        _ => CellValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
    };

    Ok(value)
}
