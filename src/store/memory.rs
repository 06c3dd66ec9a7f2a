use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::store::{CollectionKey, TaskStore};
use crate::tasks::record::TaskRecord;

/// In-process store keyed by the flat storage key. Used by tests and by
/// single-shot CLI commands that do not need persistence.
#[derive(Default)]
pub struct MemoryTaskStore {
    collections: DashMap<String, Vec<TaskRecord>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn load(&self, key: &CollectionKey) -> Result<Vec<TaskRecord>> {
        Ok(self
            .collections
            .get(&key.storage_key())
            .map(|records| records.value().clone())
            .unwrap_or_default())
    }

    async fn replace_all(&self, key: &CollectionKey, records: Vec<TaskRecord>) -> Result<()> {
        self.collections.insert(key.storage_key(), records);
        Ok(())
    }
}
