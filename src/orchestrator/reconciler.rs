use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::backend::{TaskBackend, TaskListing};
use crate::store::{CollectionKey, PredictionId, TaskStore};
use crate::tasks::fingerprint::fingerprint;
use crate::tasks::record::{TaskKind, TaskRecord, TaskStatus};

/// Merges a backend task listing into the local server-task records.
///
/// Correlation is purely by fingerprint: each non-terminal record's hash is
/// recomputed from its stored fields and looked up in the listing. The
/// backend is authoritative for status, transitions are forward-only, and
/// applying the same snapshot twice is a no-op.
pub struct Reconciler {
    store: Arc<dyn TaskStore>,
    backend: Arc<dyn TaskBackend>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn TaskStore>, backend: Arc<dyn TaskBackend>) -> Self {
        Self { store, backend }
    }

    /// Apply one listing snapshot for one kind. Returns true if any record
    /// changed (the caller's signal to re-render).
    pub async fn reconcile(
        &self,
        prediction: &PredictionId,
        kind: TaskKind,
        listing: &TaskListing,
    ) -> Result<bool> {
        let key = CollectionKey::server(prediction);
        let mut records = self.store.load(&key).await?;

        // Cheap exit: nothing left to observe for this kind.
        let has_pending = records.iter().any(|r| {
            r.as_server()
                .is_some_and(|s| s.kind == kind && !s.status.is_terminal())
        });
        if !has_pending {
            return Ok(false);
        }

        let pending_count = listing.pending_count();
        let mut changed = false;

        for record in &mut records {
            let TaskRecord::Server(local) = record else {
                continue;
            };
            if local.kind != kind || local.status.is_terminal() {
                continue;
            }

            let hash = fingerprint(local.kind, local.pocket, &local.params);
            let Some(remote) = listing.find_by_hash(&hash) else {
                // Not registered by the backend yet (or aged out); treat as
                // still queued and try again next tick.
                continue;
            };

            if remote.status == TaskStatus::Queued {
                // A stale snapshot can say queued after we saw running;
                // status never goes back, and the annotation only applies to
                // records that are still queued locally.
                if local.status == TaskStatus::Queued
                    && local.queue_position != Some(pending_count)
                {
                    local.queue_position = Some(pending_count);
                    changed = true;
                }
                continue;
            }

            if remote.status == local.status || !local.status.can_transition_to(remote.status) {
                continue;
            }

            if remote.status == TaskStatus::Successful {
                // Materialize before persisting the transition; a fetch
                // failure leaves the payload absent but the status still
                // moves, and the UI refetches later.
                match self.backend.fetch_result(prediction, kind, &hash).await {
                    Ok(payload) => local.result = Some(payload),
                    Err(e) => warn!(hash = %hash, "Failed to fetch task result: {:#}", e),
                }
            }

            info!(
                kind = kind.tag(),
                pocket = local.pocket,
                from = %local.status,
                to = %remote.status,
                "Task transition"
            );
            local.status = remote.status;
            local.queue_position = None;
            changed = true;
        }

        if changed {
            self.store.replace_all(&key, records).await?;
        } else {
            debug!(kind = kind.tag(), "Reconciliation pass: no change");
        }
        Ok(changed)
    }
}
