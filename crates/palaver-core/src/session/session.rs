//! Per-conversation session state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use crate::agent::Agent;
use crate::error::Result;
use crate::progress::ProgressHandler;

/// Result stored by one agent for other agents in the same session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResult {
    pub result: Value,
    /// Captured at write time, RFC 3339.
    pub timestamp: String,
    #[serde(flatten)]
    pub metadata: HashMap<String, Value>,
}

/// State for a single user session: cached agent instances, cross-agent
/// results, and the currently bound progress handler.
///
/// Every mutating or multi-step-reading operation runs under one owning
/// lock, which serializes agent creation and keeps expiry checks
/// consistent. The expiry clock is monotonic (`tokio::time::Instant`);
/// `created_at` is wall-clock and informational only.
pub struct Session {
    session_id: String,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
}

struct SessionState {
    last_accessed: Instant,
    agents: HashMap<String, Arc<dyn Agent>>,
    last_active_agent: Option<String>,
    results: HashMap<String, StoredResult>,
    progress: Arc<dyn ProgressHandler>,
}

impl Session {
    pub(crate) fn new(session_id: String, progress: Arc<dyn ProgressHandler>) -> Self {
        Self {
            session_id,
            created_at: Utc::now(),
            state: Mutex::new(SessionState {
                last_accessed: Instant::now(),
                agents: HashMap::new(),
                last_active_agent: None,
                results: HashMap::new(),
                progress,
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get or create the agent instance for `kind`.
    ///
    /// The owning lock spans the whole check-then-create, so concurrent
    /// callers for the same kind observe exactly one construction. The
    /// constructor receives the session's current progress handler.
    pub fn use_agent<F>(&self, kind: &str, construct: F) -> Result<Arc<dyn Agent>>
    where
        F: FnOnce(Arc<dyn ProgressHandler>) -> Result<Arc<dyn Agent>>,
    {
        let mut state = self.state.lock();
        state.last_accessed = Instant::now();

        if let Some(agent) = state.agents.get(kind) {
            debug!(session_id = %self.session_id, kind, "reusing cached agent");
            return Ok(Arc::clone(agent));
        }

        info!(session_id = %self.session_id, kind, "creating agent");
        let agent = construct(Arc::clone(&state.progress))?;
        state.agents.insert(kind.to_string(), Arc::clone(&agent));
        Ok(agent)
    }

    /// Record the most recently used agent kind.
    pub fn update_last_active(&self, kind: &str) {
        let mut state = self.state.lock();
        state.last_accessed = Instant::now();
        state.last_active_agent = Some(kind.to_string());
        debug!(session_id = %self.session_id, kind, "last active agent updated");
    }

    pub fn last_active_agent(&self) -> Option<String> {
        self.state.lock().last_active_agent.clone()
    }

    /// Store an agent result for cross-agent context. Overwrites any prior
    /// entry for the same kind; the timestamp is captured now.
    pub fn store_result(&self, kind: &str, result: Value, metadata: HashMap<String, Value>) {
        let mut state = self.state.lock();
        state.last_accessed = Instant::now();
        state.results.insert(
            kind.to_string(),
            StoredResult {
                result,
                timestamp: Utc::now().to_rfc3339(),
                metadata,
            },
        );
        debug!(session_id = %self.session_id, kind, "stored agent result");
    }

    /// Retrieve a result stored by another agent, if any.
    pub fn get_result(&self, kind: &str) -> Option<StoredResult> {
        self.state.lock().results.get(kind).cloned()
    }

    /// Clear one stored result, or all of them when `kind` is `None`.
    pub fn clear_results(&self, kind: Option<&str>) {
        let mut state = self.state.lock();
        state.last_accessed = Instant::now();
        match kind {
            Some(kind) => {
                state.results.remove(kind);
                debug!(session_id = %self.session_id, kind, "cleared stored result");
            }
            None => {
                state.results.clear();
                debug!(session_id = %self.session_id, "cleared all stored results");
            }
        }
    }

    /// Drop all cached agent instances and stored results: a fresh start
    /// that keeps the session identity.
    pub fn clear_conversation(&self) {
        let mut state = self.state.lock();
        state.last_accessed = Instant::now();
        state.agents.clear();
        state.results.clear();
        state.last_active_agent = None;
        debug!(session_id = %self.session_id, "cleared conversation state");
    }

    /// Whether more than `ttl` has passed since the last access.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        let state = self.state.lock();
        Instant::now().duration_since(state.last_accessed) > ttl
    }

    /// Refresh the last-access time. Called by the store on every lookup.
    pub(crate) fn touch(&self) {
        self.state.lock().last_accessed = Instant::now();
    }

    /// Replace the bound progress handler (e.g. per HTTP request).
    pub fn set_progress_handler(&self, handler: Arc<dyn ProgressHandler>) {
        self.state.lock().progress = handler;
    }

    /// The currently bound progress handler.
    pub fn progress(&self) -> Arc<dyn ProgressHandler> {
        Arc::clone(&self.state.lock().progress)
    }

    /// Number of cached agent instances.
    pub fn agent_count(&self) -> usize {
        self.state.lock().agents.len()
    }
}
