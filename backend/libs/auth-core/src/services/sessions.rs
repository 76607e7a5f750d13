//! Concurrent-session cap enforcement
//!
//! `SessionLifecycleManager` is the only writer of session rows. Creation
//! runs read-then-evict-then-insert: two concurrent creations for the same
//! user can both observe a count below the cap and briefly exceed it by one.
//! That race is accepted as a soft limit rather than paying for a
//! cross-request lock; the next creation corrects the count.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::Session;
use crate::storage::SessionStore;

pub struct SessionLifecycleManager {
    store: Arc<dyn SessionStore>,
    max_sessions: usize,
}

impl SessionLifecycleManager {
    pub fn new(store: Arc<dyn SessionStore>, max_sessions: usize) -> Self {
        Self {
            store,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Create a session, evicting the least-recently-active ones first if the
    /// user is at the cap. Evicted sessions are deactivated, not deleted.
    pub async fn create_session(
        &self,
        user_id: Uuid,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<Session> {
        let mut active = self.store.list_active(user_id).await?;

        if active.len() >= self.max_sessions {
            // Oldest by last activity; created-at then id break ties so
            // eviction order is fully deterministic.
            active.sort_by(|a, b| {
                a.last_activity_at
                    .cmp(&b.last_activity_at)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            });

            let excess = active.len() + 1 - self.max_sessions;
            for victim in active.iter().take(excess) {
                self.store.deactivate(victim.id).await?;
                warn!(
                    user_id = %user_id,
                    session_id = %victim.id,
                    "evicted oldest session to stay within concurrent-session cap"
                );
            }
        }

        let session = Session::new(user_id, ip_address, user_agent);
        self.store.insert(&session).await?;
        info!(user_id = %user_id, session_id = %session.id, "session created");
        Ok(session)
    }

    /// Deactivate a session. Idempotent.
    pub async fn invalidate_session(&self, session_id: Uuid) -> Result<()> {
        self.store.deactivate(session_id).await?;
        info!(session_id = %session_id, "session invalidated");
        Ok(())
    }

    /// Active sessions for a user, newest activity first. Feeds both the
    /// eviction logic and the user-facing "your active sessions" view.
    pub async fn list_active_sessions(&self, user_id: Uuid) -> Result<Vec<Session>> {
        self.store.list_active(user_id).await
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        self.store.get(session_id).await
    }

    /// Bump last-activity for a session that just authenticated a request.
    pub async fn touch(&self, session_id: Uuid) -> Result<()> {
        self.store.touch(session_id, Utc::now()).await
    }

    /// Record which token jtis are currently live for a session.
    pub async fn record_token_ids(
        &self,
        session_id: Uuid,
        access_jti: &str,
        refresh_jti: &str,
    ) -> Result<()> {
        self.store
            .record_token_ids(session_id, access_jti, refresh_jti)
            .await
    }

    /// An existing active session for the same client descriptor, if any.
    ///
    /// A browser extension re-authenticates on every service-worker wake;
    /// reusing its session instead of minting a new one keeps session growth
    /// bounded.
    pub async fn find_reusable(
        &self,
        user_id: Uuid,
        user_agent: Option<&str>,
    ) -> Result<Option<Session>> {
        let agent = match user_agent {
            Some(agent) => agent,
            None => return Ok(None),
        };

        let active = self.store.list_active(user_id).await?;
        Ok(active
            .into_iter()
            .filter(|s| s.user_agent.as_deref() == Some(agent))
            .max_by_key(|s| s.last_activity_at))
    }

    /// Deactivate every active session for a user. Returns the sessions that
    /// were active so the caller can blacklist their recorded token ids.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let active = self.store.list_active(user_id).await?;
        for session in &active {
            self.store.deactivate(session.id).await?;
        }
        if !active.is_empty() {
            warn!(user_id = %user_id, count = active.len(), "all sessions revoked");
        }
        Ok(active)
    }
}
