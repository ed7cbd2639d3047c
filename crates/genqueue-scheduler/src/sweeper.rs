//! Periodic sweep loop.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::orchestrator::QueueOrchestrator;

/// Force-dispatches full or stale batches on a fixed interval.
///
/// Per-batch timers already dispatch on timeout; the sweep makes sure a
/// lost timer can delay a batch by at most one interval.
#[derive(Debug)]
pub struct QueueSweeper {
    /// Orchestrator whose batches are swept
    orchestrator: QueueOrchestrator,
    /// Time between sweeps
    interval: Duration,
}

impl QueueSweeper {
    /// Create a sweeper using the orchestrator's configured interval
    pub fn new(orchestrator: QueueOrchestrator) -> Self {
        let interval = orchestrator.sweep_interval();
        Self {
            orchestrator,
            interval,
        }
    }

    /// Override the sweep interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until the cancel signal is received
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!("Queue sweeper started with interval={:?}", self.interval);

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Queue sweeper received shutdown signal");
                        break;
                    }
                }
                _ = time::sleep(self.interval) => {
                    let dispatched = self.orchestrator.sweep();
                    if dispatched > 0 {
                        tracing::info!("Sweep dispatched {} batch(es)", dispatched);
                    } else {
                        tracing::trace!("Sweep found nothing to dispatch");
                    }
                }
            }
        }

        tracing::info!("Queue sweeper stopped");
    }
}
