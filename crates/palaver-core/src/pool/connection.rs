//! Per-connection state and health bookkeeping.

use parking_lot::Mutex;
use tokio::time::{Duration, Instant};

/// Consecutive errors before a connection is quarantined.
const ERROR_THRESHOLD: u32 = 3;

/// How long a quarantined connection is skipped during acquisition.
/// The deadline slides on further errors and auto-expires; a success at
/// any point clears it.
const QUARANTINE: Duration = Duration::from_secs(10);

/// Snapshot of one connection's usage counters and health state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionStats {
    pub request_count: u64,
    pub error_count: u64,
    pub consecutive_errors: u32,
    pub in_use: bool,
    pub unhealthy_until: Option<Instant>,
}

/// One pool entry: an upstream client handle plus its counters.
///
/// Pure state holder; blocking and hand-out policy live in the pool. The
/// counters sit behind their own short-lived lock so health bookkeeping
/// during a checked-out call never touches the pool-wide lock.
pub struct PooledConnection<C> {
    client: C,
    stats: Mutex<ConnectionStats>,
}

impl<C> PooledConnection<C> {
    pub(crate) fn new(client: C) -> Self {
        Self {
            client,
            stats: Mutex::new(ConnectionStats::default()),
        }
    }

    /// The upstream client handle owned by this entry.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Record a successful request: bump the counter, reset the error
    /// streak, and lift any quarantine.
    pub fn record_success(&self) {
        let mut stats = self.stats.lock();
        stats.request_count += 1;
        stats.consecutive_errors = 0;
        stats.unhealthy_until = None;
    }

    /// Record a failed request. At [`ERROR_THRESHOLD`] consecutive errors
    /// the connection is quarantined for [`QUARANTINE`].
    pub fn record_error(&self) {
        let mut stats = self.stats.lock();
        stats.error_count += 1;
        stats.consecutive_errors += 1;
        if stats.consecutive_errors >= ERROR_THRESHOLD {
            stats.unhealthy_until = Some(Instant::now() + QUARANTINE);
        }
    }

    /// Copy of the current counters.
    pub fn stats(&self) -> ConnectionStats {
        *self.stats.lock()
    }

    /// Whether the connection is currently excluded for health reasons.
    pub fn is_quarantined(&self) -> bool {
        let stats = self.stats.lock();
        stats.unhealthy_until.is_some_and(|until| Instant::now() < until)
    }

    /// Atomically check the connection out if it is free and healthy.
    /// The caller holds the pool lock, so two scanners cannot race here.
    pub(crate) fn try_checkout(&self, now: Instant) -> bool {
        let mut stats = self.stats.lock();
        let quarantined = stats.unhealthy_until.is_some_and(|until| now < until);
        if stats.in_use || quarantined {
            return false;
        }
        stats.in_use = true;
        true
    }

    /// Hand the connection back to the pool.
    pub(crate) fn checkin(&self) {
        self.stats.lock().in_use = false;
    }
}
