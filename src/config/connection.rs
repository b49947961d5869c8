//! Database connection settings for sources and the sink.

use std::fmt;

use serde::Deserialize;

/// SQL dialect spoken by a source or the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Mysql,
    #[serde(alias = "postgresql")]
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Parse a dialect name as written in configuration.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mysql" => Some(Dialect::Mysql),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "sqlite" => Some(Dialect::Sqlite),
            _ => None,
        }
    }

    /// Whether table names are double-quoted in scans.
    pub fn quotes_identifiers(self) -> bool {
        !matches!(self, Dialect::Mysql)
    }

    /// Server port used when none is configured.
    pub fn default_port(self) -> u16 {
        match self {
            Dialect::Mysql => 3306,
            Dialect::Postgres => 5432,
            Dialect::Sqlite => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Mysql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host/user/password/database/port for one server.
///
/// For SQLite only `database` is used, as the database file path.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ConnectionConfig {
    /// Configured port, or the dialect default.
    pub fn port_or_default(&self, dialect: Dialect) -> u16 {
        self.port.unwrap_or_else(|| dialect.default_port())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field(
                "password",
                &if self.password.is_empty() { "MISSING" } else { "SET" },
            )
            .field("database", &self.database)
            .finish()
    }
}

/// One monitored data source and the tables watched in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Unique project name; also names the sink destination.
    pub name: String,
    pub dialect: Dialect,
    pub connection: ConnectionConfig,
    /// Tables to scan, in order.
    pub tables: Vec<String>,
}

/// Central database receiving update metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub dialect: Dialect,
    pub connection: ConnectionConfig,
}
