//! Agent seam consumed by sessions
//!
//! A session caches one agent instance per kind. The core only needs the
//! agent's identity for caching and one asynchronous "process a request"
//! operation; everything else about agent behavior belongs to the
//! adapters that construct them.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::progress::ProgressHandler;
use crate::upstream::{InputItem, ResponseRequest, UpstreamClient};

/// One conversational agent.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent kind key used for caching within a session.
    fn kind(&self) -> &str;

    /// Process one request and return the final text result.
    async fn process(&self, input: &str) -> Result<String>;
}

/// Minimal chat agent driving the pooled upstream client directly.
pub struct ChatAgent {
    client: Arc<UpstreamClient>,
    progress: Arc<dyn ProgressHandler>,
    instructions: String,
}

impl ChatAgent {
    pub const KIND: &'static str = "chat";

    pub fn new(
        client: Arc<UpstreamClient>,
        progress: Arc<dyn ProgressHandler>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            client,
            progress,
            instructions: instructions.into(),
        }
    }
}

#[async_trait]
impl Agent for ChatAgent {
    fn kind(&self) -> &str {
        Self::KIND
    }

    async fn process(&self, input: &str) -> Result<String> {
        self.progress.emit("Sending request to model", "").await;
        debug!(input_len = input.len(), "chat agent processing request");

        let request = ResponseRequest {
            instructions: Some(self.instructions.clone()),
            input: vec![InputItem::user(input)],
            ..Default::default()
        };
        let response = self.client.respond(request).await?;

        self.progress.emit("Finalizing response", "complete").await;
        Ok(response.output_text.unwrap_or_default())
    }
}
