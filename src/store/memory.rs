//! In-memory FingerprintStore.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::FingerprintStore;
use crate::error::Result;
use crate::fingerprint::Fingerprint;

/// Key type: (project, table).
type TableKey = (String, String);

/// Fingerprint store backed by a map that lives as long as the process.
///
/// Entries are created on first sight, overwritten on change and never removed.
#[derive(Default)]
pub struct InMemoryFingerprintStore {
    entries: RwLock<HashMap<TableKey, Fingerprint>>,
}

impl InMemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked tables.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl FingerprintStore for InMemoryFingerprintStore {
    async fn get(&self, project: &str, table: &str) -> Result<Option<Fingerprint>> {
        let key = (project.to_string(), table.to_string());
        Ok(self.entries.read().await.get(&key).copied())
    }

    async fn put(&self, project: &str, table: &str, fingerprint: Fingerprint) -> Result<()> {
        let key = (project.to_string(), table.to_string());
        self.entries.write().await.insert(key, fingerprint);
        Ok(())
    }
}
