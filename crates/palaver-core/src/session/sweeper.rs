//! Background expiry sweep.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use super::SessionStore;

/// Spawn the periodic expiry sweep for `store`.
///
/// Ticks every `period` and removes expired sessions. The task exits when
/// `shutdown` flips to true (or the sender is dropped); the store lock is
/// only held inside `cleanup_expired`, never across an await.
pub fn spawn_sweeper(
    store: Arc<SessionStore>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so the initial sweep
        // happens one full period after startup.
        ticker.tick().await;

        debug!(period_secs = period.as_secs(), "session sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = store.cleanup_expired();
                    if removed > 0 {
                        debug!(removed, "expiry sweep removed sessions");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("session sweeper shutting down");
                        break;
                    }
                }
            }
        }
    })
}
