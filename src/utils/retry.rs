//! Retry utilities: backoff builders.
//!
//! Uses `backon` for exponential backoff with jitter. Only process startup
//! retries; a failing poll waits for the next cycle instead.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::error::MonitorError;

/// Backoff for the sink connection at startup.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 30
/// - Jitter enabled
pub fn connection_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(30)
        .with_jitter()
}

/// Only unreachable peers are worth retrying; bad settings or SQL are not.
pub fn is_retryable(error: &MonitorError) -> bool {
    error.is_connection()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&MonitorError::Connection("refused".into())));
        assert!(!is_retryable(&MonitorError::Query("syntax".into())));
        assert!(!is_retryable(&MonitorError::Configuration("no host".into())));
    }
}
