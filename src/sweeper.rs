// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Background expiry sweeper.
//!
//! Reads already ignore expired entries, so the sweeper never changes what a
//! lookup returns. It only frees slots held by entries that are never read
//! again, which would otherwise linger until LRU pressure pushed them out.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::chain::TierChain;

/// Handle to a running sweeper task.
///
/// Dropping the handle also stops the task, at its next wakeup.
#[derive(Debug)]
pub struct Sweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn a task that purges every tier of `chain` each `interval`.
    pub fn spawn<V>(chain: Arc<TierChain<V>>, interval: Duration) -> Self
    where
        V: Clone + Send + Sync + 'static,
    {
        // tokio rejects a zero period
        let period = interval.max(Duration::from_millis(1));
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately; nothing can have expired yet
            ticker.tick().await;
            info!(interval_ms = period.as_millis() as u64, "Expiry sweeper started");

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let purged = chain.purge_expired();
                        if purged > 0 {
                            debug!(purged, "Sweeper reclaimed expired entries");
                        }
                    }
                }
            }
            info!("Expiry sweeper stopped");
        });

        Self { shutdown, handle }
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Expiry sweeper task did not exit cleanly");
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
