//! Factory seam for constructing upstream connections.

use async_trait::async_trait;
use tokio::time::Duration;

use crate::error::{Error, Result};

/// Capability the pool needs from a client handle: best-effort teardown.
///
/// Handles whose resources are released on drop can rely on the default.
#[async_trait]
pub trait PoolableClient: Send + Sync + 'static {
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Knows how to construct one upstream connection and exposes the pool's
/// sizing parameters. Concrete factories plug in per upstream service
/// without changing pool logic.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Client: PoolableClient;

    /// Construct one upstream client over the shared transport.
    /// Failure propagates out of pool initialization; the pool never
    /// retries construction internally.
    async fn create_client(&self, transport: &reqwest::Client) -> Result<Self::Client>;

    /// Number of connections the pool holds (fixed at initialization).
    fn pool_size(&self) -> usize;

    /// Wall-clock budget for acquiring a connection; also the per-request
    /// timeout baked into the shared transport.
    fn request_timeout(&self) -> Duration;

    /// Build the HTTP transport shared by every connection in the pool.
    /// Created once at initialization, torn down once at shutdown.
    fn create_transport(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout())
            .pool_max_idle_per_host(self.pool_size())
            .build()
            .map_err(|e| Error::Connection(format!("failed to build shared transport: {e}")))
    }
}
