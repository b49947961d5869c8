//! Unified SQL metrics sink.
//!
//! One implementation shared by the MySQL, PostgreSQL and SQLite sinks,
//! parameterized by database type through the `SqlDatabase` trait. Statements
//! are built with sea-query and executed with sqlx.

use std::collections::HashSet;
use std::marker::PhantomData;

use tokio::sync::RwLock;

/// Trait for SQL database backends.
///
/// Abstracts over different SQL databases by providing the pool type and
/// statement rendering for the backend's dialect.
pub trait SqlDatabase: Send + Sync + 'static {
    /// The connection pool type for this database.
    type Pool: Clone + Send + Sync;

    /// Render a sea-query CREATE TABLE statement.
    fn build_create_table(stmt: sea_query::TableCreateStatement) -> String;

    /// Render a sea-query INSERT statement.
    fn build_insert(stmt: sea_query::InsertStatement) -> String;
}

/// SQL-based implementation of MetricsSink.
pub struct SqlMetricsSink<DB: SqlDatabase> {
    pool: DB::Pool,
    /// Destinations already created during this process.
    ensured: RwLock<HashSet<String>>,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlMetricsSink<DB> {
    /// Create a new SQL metrics sink with the given pool.
    pub fn new(pool: DB::Pool) -> Self {
        Self {
            pool,
            ensured: RwLock::new(HashSet::new()),
            _marker: PhantomData,
        }
    }
}

#[cfg(feature = "mysql")]
pub mod mysql {
    //! MySQL sink backend.

    use sea_query::MysqlQueryBuilder;
    use sqlx::MySqlPool;

    /// MySQL database marker type.
    pub struct MySql;

    impl super::SqlDatabase for MySql {
        type Pool = MySqlPool;

        fn build_create_table(stmt: sea_query::TableCreateStatement) -> String {
            stmt.to_string(MysqlQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(MysqlQueryBuilder)
        }
    }

    /// MySQL metrics sink.
    pub type MysqlMetricsSink = super::SqlMetricsSink<MySql>;
}

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL sink backend.

    use sea_query::PostgresQueryBuilder;
    use sqlx::PgPool;

    /// PostgreSQL database marker type.
    pub struct Postgres;

    impl super::SqlDatabase for Postgres {
        type Pool = PgPool;

        fn build_create_table(stmt: sea_query::TableCreateStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }
    }

    /// PostgreSQL metrics sink.
    pub type PostgresMetricsSink = super::SqlMetricsSink<Postgres>;
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite sink backend.

    use sea_query::SqliteQueryBuilder;
    use sqlx::SqlitePool;

    /// SQLite database marker type.
    pub struct Sqlite;

    impl super::SqlDatabase for Sqlite {
        type Pool = SqlitePool;

        fn build_create_table(stmt: sea_query::TableCreateStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }
    }

    /// SQLite metrics sink.
    pub type SqliteMetricsSink = super::SqlMetricsSink<Sqlite>;
}

/// Macro to implement MetricsSink for a specific SQL backend.
///
/// The transaction and pool types differ per backend, so the body is stamped
/// out once per concrete database.
macro_rules! impl_metrics_sink {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::sink::MetricsSink for SqlMetricsSink<$db_type> {
            async fn ensure_destination(&self, destination: &str) -> crate::error::Result<()> {
                if self.ensured.read().await.contains(destination) {
                    return Ok(());
                }

                let stmt = crate::sink::schema::create_destination_table(destination);
                let sql = <$db_type>::build_create_table(stmt);
                sqlx::query(&sql).execute(&self.pool).await?;

                self.ensured.write().await.insert(destination.to_string());
                tracing::debug!(destination, "Destination table ready");
                Ok(())
            }

            async fn write(
                &self,
                changes: &crate::detector::ProjectChanges,
            ) -> crate::error::Result<()> {
                if changes.events.is_empty() {
                    return Ok(());
                }

                let destination = crate::sink::destination_table(&changes.project);
                self.ensure_destination(&destination).await?;

                // Dropping the transaction on an early return rolls it back.
                let mut tx = self.pool.begin().await?;
                for record in crate::sink::metric_records(changes) {
                    let stmt = crate::sink::schema::insert_metric(&destination, &record);
                    let sql = <$db_type>::build_insert(stmt);
                    sqlx::query(&sql).execute(&mut *tx).await?;
                }
                tx.commit().await?;

                tracing::info!(
                    project = %changes.project,
                    destination = %destination,
                    rows = changes.events.len(),
                    top_user = changes.summary.top_user.as_deref().unwrap_or(""),
                    "Wrote update metrics"
                );
                Ok(())
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_metrics_sink!(mysql::MySql, "mysql");
impl_metrics_sink!(postgres::Postgres, "postgres");
impl_metrics_sink!(sqlite::Sqlite, "sqlite");
