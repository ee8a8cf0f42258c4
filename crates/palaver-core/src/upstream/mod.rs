//! Pooled upstream client
//!
//! Routes every upstream call through the connection pool: acquire a
//! connection, perform the call, record the outcome on that connection's
//! health counters, and hand the slot back. Upstream errors are never
//! reinterpreted; the pool only adds bookkeeping around them.

mod responses;

pub use responses::{
    InputItem, ResponseBody, ResponseRequest, ResponsesClient, ResponsesFactory, Usage,
};

use tracing::info;

use crate::config::UpstreamConfig;
use crate::error::Result;
use crate::pool::{ConnectionFactory, ConnectionPool};

/// Pooled client for the upstream responses API.
pub struct UpstreamClient {
    pool: ConnectionPool<ResponsesFactory>,
}

impl UpstreamClient {
    /// Build the client and its (uninitialized) pool from configuration.
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let factory = ResponsesFactory::new(config)?;
        info!(
            pool_size = factory.pool_size(),
            "initialized pooled upstream client"
        );
        Ok(Self {
            pool: ConnectionPool::new(factory),
        })
    }

    /// Eagerly initialize the connection pool. Optional; the first call
    /// through [`respond`](Self::respond) initializes lazily.
    pub async fn initialize(&self) -> Result<()> {
        self.pool.initialize().await
    }

    /// Perform one responses call over a pooled connection.
    pub async fn respond(&self, request: ResponseRequest) -> Result<ResponseBody> {
        let conn = self.pool.acquire().await?;
        match conn.client().respond(request).await {
            Ok(body) => {
                conn.record_success();
                Ok(body)
            }
            Err(e) => {
                conn.record_error();
                Err(e)
            }
        }
    }

    /// Close the connection pool and release resources.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("upstream client closed");
    }

    /// The underlying pool, for inspection.
    pub fn pool(&self) -> &ConnectionPool<ResponsesFactory> {
        &self.pool
    }
}
