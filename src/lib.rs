//! Tablewatch - table change monitor
//!
//! Polls independently configured relational databases on a fixed interval,
//! detects which watched tables changed content since the previous poll and
//! records update metrics (count, credited user, calendar buckets) in a
//! central sink.

pub mod config;
pub mod detector;
pub mod error;
pub mod fingerprint;
pub mod scheduler;
pub mod sink;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod utils;

pub use error::{MonitorError, Result};
