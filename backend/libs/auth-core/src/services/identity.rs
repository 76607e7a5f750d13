//! External identity verification and caching
//!
//! Exchanging a third-party identity token for first-party session tokens
//! requires asking the provider who the token belongs to. That round-trip is
//! the one blocking call on the hot path, so verified identities are cached
//! keyed by the raw external token, with an expiry strictly below the external
//! token's own remaining validity. The provider call is made without holding
//! any lock; cache population happens after it returns.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::IdentityProviderSettings;
use crate::error::{AuthError, Result};
use crate::models::ExternalIdentity;

/// Headroom kept between a cache entry's expiry and the external token's own
/// expiry, so the cache never serves an identity the provider would reject.
const CACHE_SAFETY_MARGIN_SECS: i64 = 60;

/// An identity the provider vouched for, plus how long the provider said the
/// token remains valid (when it said at all).
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub identity: ExternalIdentity,
    pub token_expires_in: Option<Duration>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify an opaque external token and return the identity behind it.
    async fn verify(&self, external_token: &str) -> Result<VerifiedIdentity>;
}

/// Introspection response shape. Only `sub` and `email` are required;
/// name/picture/locale vary by provider and scope, and `email_verified` is
/// omitted by some providers entirely.
#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    sub: Option<String>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
    locale: Option<String>,
    expires_in: Option<i64>,
}

/// Verifies external tokens against the provider's userinfo endpoint.
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    userinfo_url: String,
    timeout: StdDuration,
}

impl HttpIdentityProvider {
    pub fn new(settings: &IdentityProviderSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            userinfo_url: settings.userinfo_url.clone(),
            timeout: StdDuration::from_secs(settings.request_timeout_secs),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify(&self, external_token: &str) -> Result<VerifiedIdentity> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(external_token)
            .timeout(self.timeout)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(AuthError::IdentityUnverified(
                    "provider rejected the token".to_string(),
                ));
            }
            status => {
                return Err(AuthError::IdentityUnreachable(format!(
                    "provider returned status {}",
                    status
                )));
            }
        }

        let info: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| AuthError::IdentityMalformed(format!("invalid userinfo body: {}", e)))?;

        let subject = info
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::IdentityMalformed("missing subject".to_string()))?;
        let email = info
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::IdentityMalformed("missing email".to_string()))?;
        if info.email_verified == Some(false) {
            return Err(AuthError::IdentityUnverified(
                "email not verified by provider".to_string(),
            ));
        }

        Ok(VerifiedIdentity {
            identity: ExternalIdentity {
                subject,
                email,
                display_name: info.name,
                given_name: info.given_name,
                family_name: info.family_name,
                picture: info.picture,
                locale: info.locale,
            },
            token_expires_in: info.expires_in.map(Duration::seconds),
        })
    }
}

struct CacheEntry {
    identity: ExternalIdentity,
    expires_at: DateTime<Utc>,
}

/// Time-boxed cache in front of an [`IdentityProvider`].
///
/// Entries are evicted lazily on read; `purge_expired` reclaims memory on the
/// maintenance schedule.
pub struct ExternalTokenCache {
    provider: Arc<dyn IdentityProvider>,
    entries: DashMap<String, CacheEntry>,
    cache_ttl: Duration,
    assumed_token_lifetime: Duration,
}

impl ExternalTokenCache {
    pub fn new(provider: Arc<dyn IdentityProvider>, settings: &IdentityProviderSettings) -> Self {
        Self {
            provider,
            entries: DashMap::new(),
            cache_ttl: Duration::seconds(settings.cache_ttl_secs as i64),
            assumed_token_lifetime: Duration::seconds(settings.token_lifetime_secs as i64),
        }
    }

    /// Resolve an external token to a verified identity, consulting the cache
    /// first.
    pub async fn validate(&self, external_token: &str) -> Result<ExternalIdentity> {
        let now = Utc::now();

        if let Some(entry) = self.entries.get(external_token) {
            if entry.expires_at > now {
                debug!("external token cache hit");
                return Ok(entry.identity.clone());
            }
        }
        // Stale entry, if any, is dropped before the provider call so a
        // failed re-validation cannot keep serving it.
        self.entries
            .remove_if(external_token, |_, entry| entry.expires_at <= now);

        let verified = self.provider.verify(external_token).await?;

        let token_lifetime = verified
            .token_expires_in
            .unwrap_or(self.assumed_token_lifetime);
        let effective_ttl = self
            .cache_ttl
            .min(token_lifetime - Duration::seconds(CACHE_SAFETY_MARGIN_SECS));

        if effective_ttl > Duration::zero() {
            self.entries.insert(
                external_token.to_string(),
                CacheEntry {
                    identity: verified.identity.clone(),
                    expires_at: now + effective_ttl,
                },
            );
        } else {
            // Token is about to expire at the provider; not worth caching.
            warn!("external token too close to expiry to cache");
        }

        info!(subject = %verified.identity.subject, "external identity verified");
        Ok(verified.identity)
    }

    /// Drop a cached token, e.g. after the provider reports it revoked.
    pub fn invalidate(&self, external_token: &str) {
        self.entries.remove(external_token);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reclaim expired entries. Safe to run concurrently with live traffic.
    ///
    /// Removals are counted inside the sweep itself; entries inserted while
    /// it runs do not skew the count.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_userinfo_body_parses() {
        let info: UserInfoResponse = serde_json::from_str(
            r#"{"sub": "abc123", "email": "writer@example.com"}"#,
        )
        .unwrap();
        assert_eq!(info.sub.as_deref(), Some("abc123"));
        assert_eq!(info.email.as_deref(), Some("writer@example.com"));
        assert!(info.email_verified.is_none());
        assert!(info.name.is_none());
        assert!(info.expires_in.is_none());
    }

    #[test]
    fn full_userinfo_body_parses() {
        let info: UserInfoResponse = serde_json::from_str(
            r#"{
                "sub": "abc123",
                "email": "writer@example.com",
                "email_verified": true,
                "name": "A Writer",
                "given_name": "A",
                "family_name": "Writer",
                "picture": "https://provider.test/p.png",
                "locale": "en",
                "expires_in": 3599
            }"#,
        )
        .unwrap();
        assert_eq!(info.email_verified, Some(true));
        assert_eq!(info.name.as_deref(), Some("A Writer"));
        assert_eq!(info.expires_in, Some(3599));
    }
}
