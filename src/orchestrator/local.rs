use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::debug;

use crate::store::{CollectionKey, PredictionId, TaskStore};
use crate::tasks::record::{ClientTaskRecord, TaskKind, TaskRecord};

/// Geometry of one pocket, supplied by whoever owns the structure data.
/// Enough to estimate a volume without dragging in a rendering engine.
#[derive(Debug, Clone, Default)]
pub struct PocketGeometry {
    /// Van der Waals radii of the pocket's surface atoms, in Angstroms.
    pub atom_radii: Vec<f64>,
}

impl PocketGeometry {
    /// Crude volume estimate: sum of the atom sphere volumes. Overlaps are
    /// ignored, which is what the in-browser original did too.
    pub fn volume(&self) -> f64 {
        self.atom_radii
            .iter()
            .map(|r| 4.0 / 3.0 * std::f64::consts::PI * r.powi(3))
            .sum()
    }
}

/// In-process computations that skip the whole submission/poll path and write
/// their result straight into the client collection.
pub struct LocalCompute {
    store: Arc<dyn TaskStore>,
}

impl LocalCompute {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Compute a client task for the pocket at `pocket_index` (0-based).
    ///
    /// If a record for the same (kind, pocket) already exists its value is
    /// returned as-is: client tasks are parameterless, so kind + pocket is
    /// the whole identity and nothing is recomputed.
    pub async fn compute(
        &self,
        prediction: &PredictionId,
        kind: TaskKind,
        pocket_index: u32,
        geometry: &PocketGeometry,
    ) -> Result<Value> {
        if kind.is_remote() {
            bail!("{} tasks run on the worker pool, not locally", kind.label());
        }

        let pocket = pocket_index + 1;
        let key = CollectionKey::client(prediction);

        let records = self.store.load(&key).await?;
        let existing = records.iter().find_map(|r| match r {
            TaskRecord::Client(c) if c.kind == kind && c.pocket == pocket => Some(c.value.clone()),
            _ => None,
        });
        if let Some(value) = existing {
            debug!(kind = kind.tag(), pocket, "Client task already computed");
            return Ok(value);
        }

        let value = match kind {
            TaskKind::Volume => json!(geometry.volume()),
            _ => unreachable!("remote kinds rejected above"),
        };

        self.store
            .append(
                &key,
                TaskRecord::Client(ClientTaskRecord {
                    kind,
                    pocket,
                    created: Utc::now(),
                    value: value.clone(),
                }),
            )
            .await?;

        Ok(value)
    }
}
