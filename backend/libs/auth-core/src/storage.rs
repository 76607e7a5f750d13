//! Storage collaborator traits
//!
//! The lifecycle logic in `services` is written against these traits so it can
//! be tested with in-memory doubles; `db` provides the Postgres
//! implementations used in production. The user store is an external
//! collaborator boundary: the security core only ever resolves or creates
//! users through it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ExternalIdentity, RevokedToken, Session, User};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<()>;

    async fn get(&self, session_id: Uuid) -> Result<Option<Session>>;

    /// All sessions with `active = true` for the user, newest activity first.
    async fn list_active(&self, user_id: Uuid) -> Result<Vec<Session>>;

    /// Set `active = false`. Idempotent; deactivating an already-inactive or
    /// unknown session is not an error.
    async fn deactivate(&self, session_id: Uuid) -> Result<()>;

    async fn touch(&self, session_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Record the jtis of the most recently issued token pair.
    async fn record_token_ids(
        &self,
        session_id: Uuid,
        access_jti: &str,
        refresh_jti: &str,
    ) -> Result<()>;
}

#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Upsert; inserting the same jti twice must not error.
    async fn insert(&self, entry: &RevokedToken) -> Result<()>;

    /// Whether `jti` has a live entry at `now`. Entries whose `expires_at`
    /// has passed count as absent (lazy expiry).
    async fn contains(&self, jti: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Reclaim storage for entries expired before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_or_create(&self, identity: &ExternalIdentity) -> Result<User>;

    async fn get_by_id(&self, user_id: Uuid) -> Result<Option<User>>;
}
