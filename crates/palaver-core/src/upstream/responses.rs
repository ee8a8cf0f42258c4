//! Responses-API connection handle and its pool factory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::pool::{ConnectionFactory, PoolableClient};

/// One input message in a responses request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputItem {
    pub role: String,
    pub content: String,
}

impl InputItem {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request body for the responses endpoint. Only the fields the gateway
/// drives are modeled; the full upstream schema stays out of scope.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponseRequest {
    /// Model override; the connection's configured default applies when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub input: Vec<InputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
}

/// Token accounting reported by the upstream.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Decoded responses-endpoint reply.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseBody {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output_text: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// One upstream connection: the shared transport plus per-connection
/// request defaults. Cheap to construct; the heavy resource (the HTTP
/// connection pool) lives in the shared transport.
pub struct ResponsesClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    retry_attempts: u32,
}

impl ResponsesClient {
    /// Default model applied when a request does not name one.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Perform one responses call. Transport-level send failures are
    /// retried up to the configured attempt count; HTTP error statuses
    /// and decode failures are surfaced immediately.
    pub async fn respond(&self, mut request: ResponseRequest) -> Result<ResponseBody> {
        if request.model.is_none() {
            request.model = Some(self.model.clone());
        }
        let url = format!("{}/responses", self.base_url.trim_end_matches('/'));

        let mut attempt = 0;
        let response = loop {
            let result = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await;
            match result {
                Ok(response) => break response,
                Err(e) if attempt < self.retry_attempts => {
                    attempt += 1;
                    warn!(attempt, "upstream send failed, retrying: {e}");
                }
                Err(e) => return Err(Error::Upstream(format!("request failed: {e}"))),
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "upstream returned {status}: {body}"
            )));
        }

        let body: ResponseBody = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("failed to decode response: {e}")))?;
        debug!(response_id = %body.id, "upstream call completed");
        Ok(body)
    }
}

#[async_trait]
impl PoolableClient for ResponsesClient {
    // Connections are released when the shared transport drops; nothing
    // to tear down per handle.
}

/// Factory producing [`ResponsesClient`] handles from upstream config.
pub struct ResponsesFactory {
    config: UpstreamConfig,
    api_key: String,
}

impl ResponsesFactory {
    /// Resolve the credential eagerly so a missing key fails at startup,
    /// not on the first pooled call.
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let api_key = config.get_api_key().ok_or_else(|| {
            Error::Config(format!(
                "no API key configured; set upstream.api_key or {}",
                config.api_key_env.as_deref().unwrap_or("the key environment variable")
            ))
        })?;
        Ok(Self { config, api_key })
    }
}

#[async_trait]
impl ConnectionFactory for ResponsesFactory {
    type Client = ResponsesClient;

    async fn create_client(&self, transport: &reqwest::Client) -> Result<ResponsesClient> {
        Ok(ResponsesClient {
            http: transport.clone(),
            base_url: self.config.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.config.model.clone(),
            retry_attempts: self.config.retry_attempts,
        })
    }

    fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }
}
