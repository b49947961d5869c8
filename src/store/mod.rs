//! Fingerprint storage.
//!
//! Remembers the last fingerprint observed for each (project, table) pair so
//! the detector can tell whether a table changed since the previous cycle.

use async_trait::async_trait;

use crate::error::Result;
use crate::fingerprint::Fingerprint;

mod memory;

pub use memory::InMemoryFingerprintStore;

/// Interface for last-seen fingerprint tracking.
///
/// Implementations:
/// - `InMemoryFingerprintStore`: process-lifetime map, lost on restart
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Last fingerprint recorded for a table, if it was ever seen.
    async fn get(&self, project: &str, table: &str) -> Result<Option<Fingerprint>>;

    /// Record the fingerprint for a table, replacing any previous one.
    async fn put(&self, project: &str, table: &str, fingerprint: Fingerprint) -> Result<()>;
}
