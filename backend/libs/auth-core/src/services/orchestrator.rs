//! Request-facing authentication entry point
//!
//! Per-request validation walks a fixed sequence of checks: token present,
//! signature valid, not expired, not blacklisted. Each check rejects with its
//! own reason code; there is no retry transition. A rejected caller must go
//! back through the refresh endpoint or the identity-exchange endpoint.
//!
//! All dependencies are injected at construction and the orchestrator is
//! immutable afterwards.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::{RevocationReason, Session, User};
use crate::security::{Claims, TokenService};
use crate::services::{ExternalTokenCache, SessionLifecycleManager, TokenBlacklist};
use crate::storage::UserStore;

/// Resolved identity attached to an authenticated request for downstream
/// handlers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub claims: Claims,
}

/// Response body of the login and refresh endpoints.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub session_id: Uuid,
}

pub struct AuthOrchestrator {
    tokens: Arc<TokenService>,
    blacklist: Arc<TokenBlacklist>,
    sessions: Arc<SessionLifecycleManager>,
    users: Arc<dyn UserStore>,
    identity: Arc<ExternalTokenCache>,
}

impl AuthOrchestrator {
    pub fn new(
        tokens: Arc<TokenService>,
        blacklist: Arc<TokenBlacklist>,
        sessions: Arc<SessionLifecycleManager>,
        users: Arc<dyn UserStore>,
        identity: Arc<ExternalTokenCache>,
    ) -> Self {
        Self {
            tokens,
            blacklist,
            sessions,
            users,
            identity,
        }
    }

    /// Validate a bearer token and resolve the caller.
    ///
    /// Rejection reasons, in check order: `missing_token`, `malformed_token`
    /// / `bad_signature` / `token_expired` (from local validation), then
    /// `token_revoked` from the blacklist.
    pub async fn authenticate(&self, bearer: Option<&str>) -> Result<AuthContext> {
        let token = bearer.ok_or(AuthError::MissingToken)?;
        let claims = self.tokens.validate_access(token)?;

        // Blacklist-store failure degrades to signature/expiry validation
        // only: rejecting every request while storage is down costs more than
        // the short revocation gap, which the access-token TTL bounds anyway.
        match self.blacklist.contains(&claims.jti).await {
            Ok(true) => return Err(AuthError::TokenRevoked),
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, jti = %claims.jti, "blacklist check failed, proceeding with local validation only");
            }
        }

        let user = self
            .users
            .get_by_id(claims.user_id()?)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // Last-activity tracking is bookkeeping; a storage hiccup here must
        // not fail an otherwise valid request.
        if let Ok(session_id) = claims.session_id() {
            if let Err(e) = self.sessions.touch(session_id).await {
                debug!(error = %e, session_id = %session_id, "failed to bump session activity");
            }
        }

        Ok(AuthContext { user, claims })
    }

    /// Exchange a verified external identity token for a first-party session.
    pub async fn exchange_identity(
        &self,
        external_token: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<SessionTokens> {
        let identity = self.identity.validate(external_token).await?;
        let user = self.users.get_or_create(&identity).await?;

        // A client that re-authenticates frequently (the extension does, on
        // every service-worker wake) keeps its session instead of minting a
        // new one each time.
        let session = match self
            .sessions
            .find_reusable(user.id, user_agent.as_deref())
            .await?
        {
            Some(existing) => {
                self.sessions.touch(existing.id).await?;
                debug!(session_id = %existing.id, "reusing active session for client");
                existing
            }
            None => {
                self.sessions
                    .create_session(user.id, ip_address, user_agent)
                    .await?
            }
        };

        let tokens = self.issue_for_session(user.id, &session).await?;
        info!(user_id = %user.id, session_id = %session.id, "identity exchange completed");
        Ok(tokens)
    }

    /// Trade a refresh token for a new pair. The old refresh token is revoked
    /// as part of the rotation, so each refresh token is good for one use.
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens> {
        let claims = self.tokens.validate_refresh(refresh_token)?;

        match self.blacklist.contains(&claims.jti).await {
            Ok(true) => return Err(AuthError::TokenRevoked),
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, jti = %claims.jti, "blacklist check failed, proceeding with local validation only");
            }
        }

        let user_id = claims.user_id()?;
        let session = self
            .sessions
            .get_session(claims.session_id()?)
            .await?
            .filter(|s| s.active)
            .ok_or(AuthError::TokenRevoked)?;

        // Rotation is a durable-state change: if the old jti cannot be
        // blacklisted, minting a replacement pair is unsafe.
        self.blacklist
            .add(
                &claims.jti,
                user_id,
                session.id,
                claims.expires_at(),
                RevocationReason::ForcedRevocation,
            )
            .await?;

        self.sessions.touch(session.id).await?;
        let tokens = self.issue_for_session(user_id, &session).await?;
        info!(user_id = %user_id, session_id = %session.id, "refresh token rotated");
        Ok(tokens)
    }

    /// Revoke the current access token and deactivate its session.
    ///
    /// The blacklist entry and session update are best-effort defense in
    /// depth: the client discards its tokens regardless, and the short access
    /// TTL is the primary mitigation, so storage trouble never turns a logout
    /// into an error.
    pub async fn logout(&self, access_token: &str) -> Result<()> {
        let claims = self.tokens.validate_access(access_token)?;
        let user_id = claims.user_id()?;
        let session_id = claims.session_id()?;

        if let Err(e) = self
            .blacklist
            .add(
                &claims.jti,
                user_id,
                session_id,
                claims.expires_at(),
                RevocationReason::Logout,
            )
            .await
        {
            warn!(error = %e, jti = %claims.jti, "failed to blacklist token on logout");
        }

        if let Err(e) = self.sessions.invalidate_session(session_id).await {
            warn!(error = %e, session_id = %session_id, "failed to deactivate session on logout");
        }

        info!(user_id = %user_id, session_id = %session_id, "logout completed");
        Ok(())
    }

    /// Security-event response: kill every session a user has and blacklist
    /// the token ids recorded on them. Returns the number of sessions
    /// revoked.
    pub async fn revoke_all_user_sessions(
        &self,
        user_id: Uuid,
        reason: RevocationReason,
    ) -> Result<usize> {
        let revoked = self.sessions.revoke_all(user_id).await?;

        // Token expiry is unknown without the tokens in hand; the refresh TTL
        // is the worst-case outstanding lifetime.
        let expires_at = Utc::now() + self.tokens.refresh_ttl();
        for session in &revoked {
            for jti in [&session.access_token_jti, &session.refresh_token_jti]
                .into_iter()
                .flatten()
            {
                self.blacklist
                    .add(jti, user_id, session.id, expires_at, reason)
                    .await?;
            }
        }

        Ok(revoked.len())
    }

    async fn issue_for_session(&self, user_id: Uuid, session: &Session) -> Result<SessionTokens> {
        let pair = self.tokens.issue_pair(user_id, session.id)?;
        self.sessions
            .record_token_ids(session.id, &pair.access_jti, &pair.refresh_jti)
            .await?;

        Ok(SessionTokens {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            session_id: session.id,
        })
    }
}
