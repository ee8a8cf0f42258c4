//! Progress handlers
//!
//! A session holds one progress handler; downstream agent logic emits
//! incremental status through it without knowing which transport is
//! listening. The closed set of implementations routes to the interactive
//! console, an event queue consumed by an SSE generator, protocol-native
//! progress reports, or nowhere.
//!
//! Calls on one handler instance are delivered in the order the caller
//! issued them; the queue-backed handlers are safe for concurrent emit.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// Injected sink for incremental status updates.
#[async_trait]
pub trait ProgressHandler: Send + Sync {
    /// Emit one progress message. `stage` is an optional label such as
    /// "reasoning" or "complete"; empty means a generic update.
    async fn emit(&self, message: &str, stage: &str);
}

/// Event pushed to SSE consumers by [`QueueProgress`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    pub stage: String,
    pub timestamp: String,
}

impl ProgressEvent {
    fn new(message: &str, stage: &str) -> Self {
        Self {
            event_type: if stage == "reasoning" {
                "reasoning".to_string()
            } else {
                "progress".to_string()
            },
            message: message.to_string(),
            stage: stage.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Progress handler for the interactive console.
pub struct ConsoleProgress;

#[async_trait]
impl ProgressHandler for ConsoleProgress {
    async fn emit(&self, message: &str, stage: &str) {
        if stage == "reasoning" {
            println!("💭 {message}");
        } else {
            println!("⏳ {message}");
        }
    }
}

/// Progress handler feeding an event queue, consumed by an SSE generator.
pub struct QueueProgress {
    tx: mpsc::Sender<ProgressEvent>,
}

impl QueueProgress {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ProgressHandler for QueueProgress {
    async fn emit(&self, message: &str, stage: &str) {
        if self.tx.send(ProgressEvent::new(message, stage)).await.is_err() {
            warn!("progress consumer dropped; event discarded");
        }
    }
}

/// Protocol-native progress report with a monotonically increasing value,
/// as consumed by MCP-style transports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    pub progress: f64,
    pub total: f64,
    pub message: String,
}

/// Progress handler emitting numbered [`ProgressReport`]s.
pub struct ReportProgress {
    tx: mpsc::Sender<ProgressReport>,
    count: AtomicU64,
}

impl ReportProgress {
    pub fn new(tx: mpsc::Sender<ProgressReport>) -> Self {
        Self {
            tx,
            count: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl ProgressHandler for ReportProgress {
    async fn emit(&self, message: &str, stage: &str) {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        let message = if stage.is_empty() {
            message.to_string()
        } else {
            format!("{stage}: {message}")
        };
        let report = ProgressReport {
            progress: n as f64,
            total: 100.0,
            message,
        };
        if self.tx.send(report).await.is_err() {
            warn!("progress consumer dropped; report discarded");
        }
    }
}

/// No-op progress handler for tests or when progress is disabled.
pub struct NoopProgress;

#[async_trait]
impl ProgressHandler for NoopProgress {
    async fn emit(&self, _message: &str, _stage: &str) {}
}
