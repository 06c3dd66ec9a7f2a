use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::backend::{TaskBackend, TaskListing};
use crate::config::DEFAULT_POLL_INTERVAL_SECS;
use crate::orchestrator::reconciler::Reconciler;
use crate::store::{PredictionId, TaskStore};
use crate::tasks::record::TaskKind;

/// Recurring status poll for one prediction.
///
/// Each tick fetches the remote listing for every server kind, then runs the
/// reconciler over the successful fetches. Fetch failures are expected and
/// swallowed; the next tick retries naturally. Ticks are serialized: a slow
/// backend delays the next tick instead of stacking concurrent ones.
pub struct Poller {
    backend: Arc<dyn TaskBackend>,
    reconciler: Reconciler,
    prediction: PredictionId,
    interval: Duration,
}

impl Poller {
    pub fn new(
        store: Arc<dyn TaskStore>,
        backend: Arc<dyn TaskBackend>,
        prediction: PredictionId,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(store, backend.clone()),
            backend,
            prediction,
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Fetch phase of one tick: listings for every server kind. A failed
    /// fetch drops that kind from this tick.
    async fn fetch_listings(&self) -> Vec<(TaskKind, TaskListing)> {
        let mut listings = Vec::new();
        for kind in TaskKind::SERVER_KINDS {
            match self.backend.list_tasks(&self.prediction, kind).await {
                Ok(listing) => listings.push((kind, listing)),
                Err(e) => debug!(kind = kind.tag(), "Poll fetch failed, skipping: {:#}", e),
            }
        }
        listings
    }

    /// One poll pass: fetch everything, then reconcile. Returns true if any
    /// record changed. Exposed for callers that drive their own schedule.
    pub async fn tick(&self) -> bool {
        let listings = self.fetch_listings().await;
        let mut changed = false;
        for (kind, listing) in &listings {
            match self.reconciler.reconcile(&self.prediction, *kind, listing).await {
                Ok(c) => changed |= c,
                Err(e) => debug!(kind = kind.tag(), "Reconciliation failed: {:#}", e),
            }
        }
        changed
    }

    /// Start the interval-driven background job. The returned handle owns the
    /// loop: dropping it (or calling `stop`) cancels the timer, and the
    /// liveness flag keeps an in-flight tick from writing afterwards.
    pub fn spawn(self) -> PollerHandle {
        let alive = Arc::new(AtomicBool::new(true));
        let (change_tx, change_rx) = mpsc::channel(8);

        let loop_alive = alive.clone();
        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick fires immediately; skip it so the loop
            // waits one full period before the first poll.
            timer.tick().await;

            loop {
                timer.tick().await;
                if !loop_alive.load(Ordering::SeqCst) {
                    break;
                }

                let listings = self.fetch_listings().await;

                // The owner may have stopped us while the fetches were in
                // flight; reconciling now would write after teardown.
                if !loop_alive.load(Ordering::SeqCst) {
                    break;
                }

                let mut changed = false;
                for (kind, listing) in &listings {
                    if !loop_alive.load(Ordering::SeqCst) {
                        return;
                    }
                    match self.reconciler.reconcile(&self.prediction, *kind, listing).await {
                        Ok(c) => changed |= c,
                        Err(e) => debug!(kind = kind.tag(), "Reconciliation failed: {:#}", e),
                    }
                }

                if changed {
                    // Best-effort signal; a full channel means the consumer
                    // already has a pending wake-up.
                    let _ = change_tx.try_send(());
                }
            }
        });

        PollerHandle {
            alive,
            task,
            changes: change_rx,
        }
    }
}

/// Start/stop handle of a spawned poll loop.
pub struct PollerHandle {
    alive: Arc<AtomicBool>,
    task: JoinHandle<()>,
    changes: mpsc::Receiver<()>,
}

impl PollerHandle {
    /// Waits for the next "some record changed" signal. `None` after stop.
    pub async fn changed(&mut self) -> Option<()> {
        self.changes.recv().await
    }

    pub fn stop(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.task.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
