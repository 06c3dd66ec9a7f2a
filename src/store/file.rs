use std::path::{Path, PathBuf};

use anyhow::{Context as AnyhowContext, Result};
use async_trait::async_trait;

use crate::store::{CollectionKey, TaskStore};
use crate::tasks::record::TaskRecord;

/// File-backed store: one JSON file per collection under a root directory.
///
/// This is the crate's analogue of the browser's persistent storage. Writes
/// go through a `.swp` sibling followed by a rename, so a concurrent reader
/// never observes a torn file; simultaneous writers resolve last-writer-wins.
pub struct FileTaskStore {
    root: PathBuf,
}

impl FileTaskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collection_path(&self, key: &CollectionKey) -> PathBuf {
        self.root.join(format!("{}.json", key.storage_key()))
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn load(&self, key: &CollectionKey) -> Result<Vec<TaskRecord>> {
        let path = self.collection_path(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse task collection {}", path.display()))
    }

    async fn replace_all(&self, key: &CollectionKey, records: Vec<TaskRecord>) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create store root {}", self.root.display()))?;

        let path = self.collection_path(key);
        let swap = swap_path(&path);
        let content = serde_json::to_string(&records)?;
        tokio::fs::write(&swap, content)
            .await
            .with_context(|| format!("Failed to write {}", swap.display()))?;
        tokio::fs::rename(&swap, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

fn swap_path(path: &Path) -> PathBuf {
    let mut os_string = path.as_os_str().to_owned();
    os_string.push(".swp");
    PathBuf::from(os_string)
}
