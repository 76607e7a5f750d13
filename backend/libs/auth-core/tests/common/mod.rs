//! In-memory test doubles for the storage and identity-provider collaborators.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use auth_core::config::{IdentityProviderSettings, JwtSettings};
use auth_core::error::{AuthError, Result};
use auth_core::models::{ExternalIdentity, RevokedToken, Session, User};
use auth_core::services::{IdentityProvider, VerifiedIdentity};
use auth_core::storage::{RevocationStore, SessionStore, UserStore};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

static TRACING: Once = Once::new();

/// Install a subscriber once per test binary so `RUST_LOG` controls output.
pub fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: "integration-test-secret-0123456789abcdef".to_string(),
        issuer: "quillbox-api".to_string(),
        audience: "quillbox-extension".to_string(),
        access_ttl_secs: 900,
        refresh_ttl_secs: 86_400,
        leeway_secs: 0,
    }
}

pub fn identity_settings() -> IdentityProviderSettings {
    IdentityProviderSettings {
        userinfo_url: "https://provider.test/userinfo".to_string(),
        request_timeout_secs: 5,
        cache_ttl_secs: 3000,
        token_lifetime_secs: 3600,
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a session directly, bypassing the lifecycle manager. Used to set
    /// up deterministic timestamps.
    pub fn seed(&self, session: Session) {
        self.sessions.lock().unwrap().insert(session.id, session);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<Session>> {
        Ok(self.sessions.lock().unwrap().get(&session_id).cloned())
    }

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let mut active: Vec<Session> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id && s.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(active)
    }

    async fn deactivate(&self, session_id: Uuid) -> Result<()> {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&session_id) {
            session.active = false;
        }
        Ok(())
    }

    async fn touch(&self, session_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&session_id) {
            session.last_activity_at = at;
        }
        Ok(())
    }

    async fn record_token_ids(
        &self,
        session_id: Uuid,
        access_jti: &str,
        refresh_jti: &str,
    ) -> Result<()> {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&session_id) {
            session.access_token_jti = Some(access_jti.to_string());
            session.refresh_token_jti = Some(refresh_jti.to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: Mutex<HashMap<String, RevokedToken>>,
    fail: AtomicBool,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, simulating unreachable storage.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn check_available(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(AuthError::Database("revocation store unreachable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn insert(&self, entry: &RevokedToken) -> Result<()> {
        self.check_available()?;
        self.entries
            .lock()
            .unwrap()
            .insert(entry.jti.clone(), entry.clone());
        Ok(())
    }

    async fn contains(&self, jti: &str, now: DateTime<Utc>) -> Result<bool> {
        self.check_available()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(jti)
            .is_some_and(|e| e.expires_at > now))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        self.check_available()?;
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at >= now);
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    by_subject: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_or_create(&self, identity: &ExternalIdentity) -> Result<User> {
        let mut users = self.by_subject.lock().unwrap();
        let user = users
            .entry(identity.subject.clone())
            .or_insert_with(|| User {
                id: Uuid::new_v4(),
                email: identity.email.clone(),
                display_name: identity.display_name.clone(),
                created_at: Utc::now(),
            });
        Ok(user.clone())
    }

    async fn get_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self
            .by_subject
            .lock()
            .unwrap()
            .values()
            .find(|u| u.id == user_id)
            .cloned())
    }
}

/// Identity provider double that counts how often it is actually consulted.
pub struct CountingProvider {
    calls: AtomicUsize,
    identity: ExternalIdentity,
    token_expires_in: Option<i64>,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self::with_identity(sample_identity())
    }

    pub fn with_identity(identity: ExternalIdentity) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            identity,
            token_expires_in: None,
        }
    }

    pub fn with_token_expires_in(mut self, secs: i64) -> Self {
        self.token_expires_in = Some(secs);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for CountingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for CountingProvider {
    async fn verify(&self, _external_token: &str) -> Result<VerifiedIdentity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(VerifiedIdentity {
            identity: self.identity.clone(),
            token_expires_in: self.token_expires_in.map(Duration::seconds),
        })
    }
}

pub fn sample_identity() -> ExternalIdentity {
    ExternalIdentity {
        subject: "ext-subject-1".to_string(),
        email: "writer@example.com".to_string(),
        display_name: Some("Writer".to_string()),
        given_name: None,
        family_name: None,
        picture: None,
        locale: None,
    }
}
