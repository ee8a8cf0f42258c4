//! Keyed session collection with TTL-based expiry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::progress::ProgressHandler;

use super::Session;

/// Store of all live sessions, keyed by session id.
///
/// The store lock guards the map's structure only; each session's fields
/// are protected by that session's own lock. Presence in the map is the
/// sole criterion of existence: expiry is evaluated on demand and removal
/// happens only through [`cleanup_expired`](Self::cleanup_expired) or an
/// explicit delete.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    default_ttl: Duration,
}

impl SessionStore {
    pub fn new(default_ttl: Duration) -> Self {
        info!(ttl_secs = default_ttl.as_secs(), "session store initialized");
        Self {
            sessions: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Create a new session bound to `progress` and return its id.
    pub fn create_session(&self, progress: Arc<dyn ProgressHandler>) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(session_id.clone(), progress));
        self.sessions.lock().insert(session_id.clone(), session);
        info!(%session_id, "created new session");
        session_id
    }

    /// Look up a session, refreshing its last-access time as a side effect.
    /// Any successful lookup extends the session's life, so long-running
    /// operations that repeatedly look it up cannot expire mid-flight.
    pub fn get_session(&self, session_id: &str) -> Option<Arc<Session>> {
        let sessions = self.sessions.lock();
        match sessions.get(session_id) {
            Some(session) => {
                session.touch();
                debug!(%session_id, "session accessed, expiry refreshed");
                Some(Arc::clone(session))
            }
            None => {
                warn!(%session_id, "session not found");
                None
            }
        }
    }

    /// Remove a session. Returns whether it was present.
    pub fn delete_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.lock().remove(session_id).is_some();
        if removed {
            info!(%session_id, "deleted session");
        }
        removed
    }

    /// Remove every session older than the default TTL and return how many
    /// were removed. The only path that removes sessions purely due to age.
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| session.is_expired(self.default_ttl))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "cleaned up expired sessions");
        }
        expired.len()
    }

    /// Current number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// The TTL applied by the expiry sweep.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;

    fn test_store(ttl_secs: u64) -> SessionStore {
        SessionStore::new(Duration::from_secs(ttl_secs))
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let store = test_store(60);
        let id = store.create_session(Arc::new(NoopProgress));
        let session = store.get_session(&id).unwrap();
        assert_eq!(session.session_id(), id);
        assert_eq!(store.session_count(), 1);
    }

    #[tokio::test]
    async fn test_get_unknown_session_is_none() {
        let store = test_store(60);
        assert!(store.get_session("no-such-id").is_none());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let store = test_store(60);
        let id = store.create_session(Arc::new(NoopProgress));
        assert!(store.delete_session(&id));
        assert!(!store.delete_session(&id));
        assert!(store.get_session(&id).is_none());
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let store = test_store(60);
        let a = store.create_session(Arc::new(NoopProgress));
        let b = store.create_session(Arc::new(NoopProgress));
        assert_ne!(a, b);
        assert_eq!(store.session_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_removes_exactly_the_expired() {
        let store = test_store(60);
        let old = store.create_session(Arc::new(NoopProgress));
        tokio::time::advance(Duration::from_secs(61)).await;
        let fresh = store.create_session(Arc::new(NoopProgress));

        assert_eq!(store.cleanup_expired(), 1);
        assert!(store.get_session(&old).is_none());
        assert!(store.get_session(&fresh).is_some());
        assert_eq!(store.session_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_on_access_prevents_expiry() {
        let store = test_store(60);
        let id = store.create_session(Arc::new(NoopProgress));

        // Accessed every ttl/2: never expires even though total elapsed
        // wall time exceeds the TTL.
        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(30)).await;
            assert!(store.get_session(&id).is_some());
        }
        assert_eq!(store.cleanup_expired(), 0);
        assert!(store.get_session(&id).is_some());
    }
}
