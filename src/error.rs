//! Error types shared by the polling pipeline.

use thiserror::Error;

/// Result type for monitoring operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors raised while polling sources or writing metrics.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A source database or the sink could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A scan or insert failed against a reachable connection.
    #[error("Query error: {0}")]
    Query(String),

    /// A project or sink is missing required settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A column value could not be converted into a cell.
    #[error("Cannot decode {table}.{column}: {reason}")]
    Decode {
        table: String,
        column: String,
        reason: String,
    },
}

impl MonitorError {
    /// Whether this error means the peer was unreachable.
    pub fn is_connection(&self) -> bool {
        matches!(self, MonitorError::Connection(_))
    }
}

impl From<sqlx::Error> for MonitorError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => MonitorError::Connection(err.to_string()),
            other => MonitorError::Query(other.to_string()),
        }
    }
}

impl From<crate::config::ConfigError> for MonitorError {
    fn from(err: crate::config::ConfigError) -> Self {
        MonitorError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_connection_error() {
        let err: MonitorError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_connection());
    }

    #[test]
    fn test_io_failure_is_connection_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: MonitorError = sqlx::Error::Io(io).into();
        assert!(err.is_connection());
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_row_not_found_is_query_error() {
        let err: MonitorError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, MonitorError::Query(_)));
    }

    #[test]
    fn test_decode_error_display() {
        let err = MonitorError::Decode {
            table: "vehicles".to_string(),
            column: "plate".to_string(),
            reason: "bad utf-8".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot decode vehicles.plate: bad utf-8");
    }
}
