//! Upstream connection pool
//!
//! A fixed-size set of pooled connections with round-robin acquisition,
//! health-based skip, and bounded-wait backpressure:
//!
//! - `acquire()` scans the full pool starting at a rotating index, so
//!   successive acquisitions prefer different connections.
//! - Connections with three consecutive errors are quarantined for ten
//!   seconds and skipped until the deadline passes.
//! - When every connection is busy or quarantined, acquirers wait in
//!   one-second slices up to the factory's request timeout, then fail
//!   with [`Error::PoolExhausted`].
//! - Releasing a connection (dropping its guard) wakes **all** waiters so
//!   every blocked acquirer re-scans; fairness is eventual, not FIFO.
//!
//! The pool is initialized at most once (idempotent), and `close()` fully
//! resets it: a later `acquire()` re-initializes from scratch.

mod connection;
mod factory;

pub use connection::{ConnectionStats, PooledConnection};
pub use factory::{ConnectionFactory, PoolableClient};

use std::pin::pin;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Upper bound on one wait slice, so late releases and the timeout check
/// are both observed promptly.
const WAIT_GRANULARITY: Duration = Duration::from_secs(1);

/// Fixed-size connection pool with round-robin load balancing.
pub struct ConnectionPool<F: ConnectionFactory> {
    factory: F,
    inner: Mutex<PoolInner<F::Client>>,
    /// Signalled (wake-all) whenever a connection is handed back.
    released: Arc<Notify>,
}

struct PoolInner<C> {
    connections: Vec<Arc<PooledConnection<C>>>,
    current_index: usize,
    transport: Option<reqwest::Client>,
    initialized: bool,
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    /// Create an uninitialized pool around a factory. No connections are
    /// constructed until [`initialize`](Self::initialize) or the first
    /// [`acquire`](Self::acquire).
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            inner: Mutex::new(PoolInner {
                connections: Vec::new(),
                current_index: 0,
                transport: None,
                initialized: false,
            }),
            released: Arc::new(Notify::new()),
        }
    }

    /// The factory driving this pool.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Initialize the pool: build the shared transport, then exactly
    /// `pool_size` connections. Idempotent; concurrent callers serialize
    /// on the pool lock and later calls are no-ops.
    ///
    /// If any construction fails, already-built connections are closed
    /// (best effort) and the pool is left uninitialized so a later call
    /// can retry.
    pub async fn initialize(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.initialize_locked(&mut inner).await
    }

    async fn initialize_locked(&self, inner: &mut PoolInner<F::Client>) -> Result<()> {
        if inner.initialized {
            return Ok(());
        }
        let size = self.factory.pool_size();
        info!(pool_size = size, "initializing connection pool");

        let transport = self.factory.create_transport()?;
        let mut connections: Vec<Arc<PooledConnection<F::Client>>> = Vec::with_capacity(size);
        for _ in 0..size {
            match self.factory.create_client(&transport).await {
                Ok(client) => connections.push(Arc::new(PooledConnection::new(client))),
                Err(e) => {
                    // Tear down partial state so a later initialize starts clean.
                    for conn in &connections {
                        if let Err(close_err) = conn.client().close().await {
                            warn!("error closing connection during init rollback: {close_err}");
                        }
                    }
                    return Err(e);
                }
            }
        }

        inner.connections = connections;
        inner.transport = Some(transport);
        inner.current_index = 0;
        inner.initialized = true;
        info!(
            pool_size = inner.connections.len(),
            "connection pool initialized"
        );
        Ok(())
    }

    /// Acquire a free, healthy connection, waiting up to the factory's
    /// request timeout. Initializes the pool lazily on first use.
    ///
    /// The returned guard hands the connection back (and wakes all
    /// waiters) when dropped, so a timeout or panic in the caller never
    /// leaks an in-use slot.
    pub async fn acquire(&self) -> Result<ConnectionGuard<F::Client>> {
        let start = Instant::now();
        let timeout = self.factory.request_timeout();

        loop {
            let mut inner = self.inner.lock().await;
            if !inner.initialized {
                self.initialize_locked(&mut inner).await?;
            }

            let now = Instant::now();
            let len = inner.connections.len();
            for _ in 0..len {
                let idx = inner.current_index;
                inner.current_index = (inner.current_index + 1) % len;
                let conn = &inner.connections[idx];
                if conn.try_checkout(now) {
                    return Ok(ConnectionGuard {
                        conn: Arc::clone(conn),
                        released: Arc::clone(&self.released),
                    });
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                debug!(pool_size = len, ?elapsed, "pool exhausted");
                return Err(Error::PoolExhausted {
                    pool_size: len,
                    elapsed,
                    timeout,
                });
            }

            // Register for the release signal before unlocking so a
            // hand-back between the scan and the wait is not missed, then
            // wait a bounded slice and re-scan.
            let wait = WAIT_GRANULARITY.min(timeout - elapsed);
            let mut released = pin!(self.released.notified());
            released.as_mut().enable();
            drop(inner);
            let _ = tokio::time::timeout(wait, released).await;
        }
    }

    /// Close every connection's client handle (best effort: failures are
    /// logged and skipped), drop the shared transport, and reset the pool
    /// to its uninitialized state. Blocked acquirers are woken and will
    /// re-initialize on their next scan.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.initialized {
            return;
        }
        for conn in inner.connections.drain(..) {
            if let Err(e) = conn.client().close().await {
                warn!("error closing pooled connection: {e}");
            }
        }
        inner.transport = None;
        inner.current_index = 0;
        inner.initialized = false;
        drop(inner);

        self.released.notify_waiters();
        info!("connection pool closed");
    }

    /// Whether the pool currently holds live connections.
    pub async fn is_initialized(&self) -> bool {
        self.inner.lock().await.initialized
    }

    /// Number of connections currently held (0 before init / after close).
    pub async fn size(&self) -> usize {
        self.inner.lock().await.connections.len()
    }
}

/// Exclusive checkout of one pooled connection.
///
/// Dropping the guard returns the connection to the pool and wakes all
/// waiters so blocked acquirers compete fairly for the freed slot.
pub struct ConnectionGuard<C> {
    conn: Arc<PooledConnection<C>>,
    released: Arc<Notify>,
}

impl<C> ConnectionGuard<C> {
    /// The checked-out client handle.
    pub fn client(&self) -> &C {
        self.conn.client()
    }

    /// Record a successful upstream call on this connection.
    pub fn record_success(&self) {
        self.conn.record_success();
    }

    /// Record a failed upstream call on this connection.
    pub fn record_error(&self) {
        self.conn.record_error();
    }

    /// Counter snapshot for the underlying connection.
    pub fn stats(&self) -> ConnectionStats {
        self.conn.stats()
    }
}

impl<C> std::fmt::Debug for ConnectionGuard<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<C> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        self.conn.checkin();
        self.released.notify_waiters();
    }
}
