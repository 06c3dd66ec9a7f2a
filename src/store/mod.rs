use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tasks::record::TaskRecord;

pub mod file;
pub mod memory;

/// Identifies one prediction (one analyzed structure) in one database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredictionId {
    pub database: String,
    pub id: String,
}

impl PredictionId {
    pub fn new(database: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            id: id.into(),
        }
    }
}

/// The two persisted collections a prediction owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    ServerTasks,
    ClientTasks,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::ServerTasks => "serverTasks",
            Collection::ClientTasks => "clientTasks",
        }
    }
}

/// Storage address of one task collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    pub prediction: PredictionId,
    pub collection: Collection,
}

impl CollectionKey {
    pub fn new(prediction: PredictionId, collection: Collection) -> Self {
        Self {
            prediction,
            collection,
        }
    }

    pub fn server(prediction: &PredictionId) -> Self {
        Self::new(prediction.clone(), Collection::ServerTasks)
    }

    pub fn client(prediction: &PredictionId) -> Self {
        Self::new(prediction.clone(), Collection::ClientTasks)
    }

    /// Flat key derived from database + id + collection name, the same shape
    /// the browser original used for its storage keys.
    pub fn storage_key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.prediction.database,
            self.prediction.id,
            self.collection.as_str()
        )
    }
}

/// Persisted, per-collection task records.
///
/// Collections are created lazily on first write and `load` never fails on a
/// missing one. `created` is the only key used for update/remove. There is no
/// locking; every mutating default method is a read-modify-write over
/// `load`/`replace_all`, and concurrent writers resolve last-writer-wins.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Ordered records of the collection, `[]` if it does not exist yet.
    async fn load(&self, key: &CollectionKey) -> Result<Vec<TaskRecord>>;

    /// Bulk overwrite, atomic from the caller's perspective.
    async fn replace_all(&self, key: &CollectionKey, records: Vec<TaskRecord>) -> Result<()>;

    /// Append one record at the end. Uniqueness of `created` is by
    /// convention; callers must not append duplicates.
    async fn append(&self, key: &CollectionKey, record: TaskRecord) -> Result<()> {
        let mut records = self.load(key).await?;
        records.push(record);
        self.replace_all(key, records).await
    }

    /// Mutate the one record whose `created` matches; no-op if absent.
    async fn update(
        &self,
        key: &CollectionKey,
        created: DateTime<Utc>,
        mutate: Box<dyn for<'a> FnOnce(&'a mut TaskRecord) + Send>,
    ) -> Result<()> {
        let mut records = self.load(key).await?;
        match records.iter_mut().find(|r| r.created() == created) {
            Some(record) => mutate(record),
            None => return Ok(()),
        }
        self.replace_all(key, records).await
    }

    /// Delete the one record whose `created` matches; no-op if absent.
    async fn remove(&self, key: &CollectionKey, created: DateTime<Utc>) -> Result<()> {
        let mut records = self.load(key).await?;
        let before = records.len();
        records.retain(|r| r.created() != created);
        if records.len() == before {
            return Ok(());
        }
        self.replace_all(key, records).await
    }
}
