//! Revoked-token blacklist
//!
//! Records token identifiers (jti), not raw tokens, so a revocation check
//! never needs the token's cryptographic content. Entries are dead once the
//! token itself would have expired; `contains` treats them as absent and
//! `purge_expired` reclaims the rows on the maintenance schedule.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{RevocationReason, RevokedToken};
use crate::storage::RevocationStore;

pub struct TokenBlacklist {
    store: Arc<dyn RevocationStore>,
}

impl TokenBlacklist {
    pub fn new(store: Arc<dyn RevocationStore>) -> Self {
        Self { store }
    }

    /// Blacklist a token identifier until the token's own expiry.
    ///
    /// Idempotent: re-adding a jti upserts rather than erroring.
    pub async fn add(
        &self,
        jti: &str,
        user_id: Uuid,
        session_id: Uuid,
        expires_at: DateTime<Utc>,
        reason: RevocationReason,
    ) -> Result<()> {
        let entry = RevokedToken {
            jti: jti.to_string(),
            user_id,
            session_id,
            expires_at,
            reason,
            revoked_at: Utc::now(),
        };
        self.store.insert(&entry).await?;
        info!(jti = %jti, user_id = %user_id, reason = reason.as_str(), "token blacklisted");
        Ok(())
    }

    /// Whether the jti is currently revoked. Runs on every token validation,
    /// so the store call must stay cheap.
    pub async fn contains(&self, jti: &str) -> Result<bool> {
        self.store.contains(jti, Utc::now()).await
    }

    /// Drop entries whose tokens have expired anyway.
    pub async fn purge_expired(&self) -> Result<u64> {
        let purged = self.store.purge_expired(Utc::now()).await?;
        if purged > 0 {
            info!(purged, "purged expired blacklist entries");
        }
        Ok(purged)
    }
}
