//! PostgreSQL snapshot fetcher.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Row, TypeInfo, ValueRef};
use tracing::debug;

use super::{decode_rows, scan_statement, SnapshotFetcher};
use crate::config::{ConnectionConfig, Dialect};
use crate::error::Result;
use crate::snapshot::{CellValue, TableSnapshot};

/// PostgreSQL implementation of SnapshotFetcher.
pub struct PostgresSource {
    pool: PgPool,
}

impl PostgresSource {
    /// Create a PostgreSQL source over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a source that connects on first use, one connection at a time.
    pub fn connect_lazy(connection: &ConnectionConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&connection.host)
            .port(connection.port_or_default(Dialect::Postgres))
            .username(&connection.user)
            .password(&connection.password)
            .database(&connection.database);

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(options);

        Self::new(pool)
    }
}

#[async_trait]
impl SnapshotFetcher for PostgresSource {
    async fn fetch(&self, table: &str) -> Result<TableSnapshot> {
        let sql = scan_statement(table, Dialect::Postgres);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        debug!(table, rows = rows.len(), "Scanned PostgreSQL table");
        decode_rows(table, &rows, decode_cell)
    }
}

fn decode_cell(row: &PgRow, index: usize) -> std::result::Result<CellValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(CellValue::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "BOOL" => CellValue::Bool(row.try_get(index)?),
        "INT2" => CellValue::Int(row.try_get::<i16, _>(index)?.into()),
        "INT4" => CellValue::Int(row.try_get::<i32, _>(index)?.into()),
        "INT8" => CellValue::Int(row.try_get(index)?),
        "FLOAT4" => CellValue::Float(f64::from(row.try_get::<f32, _>(index)?)),
        "FLOAT8" => CellValue::Float(row.try_get(index)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => CellValue::Text(row.try_get(index)?),
        "UUID" => CellValue::Text(row.try_get::<uuid::Uuid, _>(index)?.to_string()),
        "TIMESTAMP" => CellValue::Timestamp(row.try_get::<NaiveDateTime, _>(index)?),
        "TIMESTAMPTZ" => {
            CellValue::Timestamp(row.try_get::<DateTime<Utc>, _>(index)?.naive_utc())
        }
        "DATE" => CellValue::Date(row.try_get::<NaiveDate, _>(index)?),
        "TIME" => CellValue::Time(row.try_get::<NaiveTime, _>(index)?),
        "BYTEA" => CellValue::Bytes(row.try_get(index)?),
        // NUMERIC, JSON(B), arrays and the like keep their binary wire form.
        _ => CellValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
    };

    Ok(value)
}
