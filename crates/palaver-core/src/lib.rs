//! Palaver Core - session gateway over a pooled model upstream
//!
//! This crate provides the core functionality for the Palaver gateway:
//! - Generic connection pool with round-robin load balancing, health
//!   tracking, and bounded-wait backpressure
//! - Session store with TTL expiry, concurrent-safe agent caching, and
//!   cross-agent result sharing
//! - Progress handlers routing incremental updates to console, SSE
//!   queues, or protocol-native reports
//! - Pooled client for the upstream responses API

pub mod agent;
pub mod config;
pub mod error;
pub mod pool;
pub mod progress;
pub mod session;
pub mod upstream;

pub use agent::{Agent, ChatAgent};
pub use config::{Config, SessionSettings, UpstreamConfig};
pub use error::{Error, Result};
pub use pool::{
    ConnectionFactory, ConnectionGuard, ConnectionPool, ConnectionStats, PoolableClient,
    PooledConnection,
};
pub use progress::{
    ConsoleProgress, NoopProgress, ProgressEvent, ProgressHandler, ProgressReport, QueueProgress,
    ReportProgress,
};
pub use session::{spawn_sweeper, Session, SessionStore, StoredResult};
pub use upstream::{
    InputItem, ResponseBody, ResponseRequest, ResponsesClient, ResponsesFactory, UpstreamClient,
};
