use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::store::{EventStore, History, Record, StoreError};
use crate::types::Version;

/// In-memory [`EventStore`], mostly useful for tests.
///
/// The whole store is guarded by a single lock. Saves are plain appends: no duplicate version or
/// concurrency check is performed, use a [`super::transactional::TransactionalStore`] when those
/// guarantees are needed.
///
/// Clones share the same underlying storage.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    events_by_id: Arc<Mutex<HashMap<String, History>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    #[tracing::instrument(skip_all, fields(aggregate_id = %aggregate_id, records = records.len()))]
    async fn save(&self, aggregate_id: &str, records: Vec<Record>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut guard = self.events_by_id.lock().await;
        guard.entry(aggregate_id.to_string()).or_default().extend(records);

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn load(
        &self,
        aggregate_id: &str,
        from_version: Version,
        to_version: Version,
    ) -> Result<History, StoreError> {
        let guard = self.events_by_id.lock().await;
        let all = guard
            .get(aggregate_id)
            .ok_or_else(|| StoreError::NotFound(aggregate_id.to_string()))?;

        Ok(all
            .iter()
            .filter(|record| record.version >= from_version && (to_version == 0 || record.version <= to_version))
            .cloned()
            .collect())
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}
