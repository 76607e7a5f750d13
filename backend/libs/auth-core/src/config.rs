//! Configuration for the session & token security core
//!
//! Loads settings from environment variables, with a `.env` file picked up in
//! development builds. Cross-field invariants (access TTL shorter than refresh
//! TTL, identity cache TTL shorter than the external token lifetime) are
//! validated here at construction; they are configuration errors, not runtime
//! conditions, and nothing downstream re-checks them defensively.

use std::collections::HashSet;
use std::env;

use anyhow::{ensure, Context, Result};
use rate_limit::{BucketPolicy, EndpointClass, RateLimitConfig};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub session: SessionSettings,
    pub identity_provider: IdentityProviderSettings,
    pub rate_limit: RateLimitSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            database: DatabaseSettings::from_env()?,
            jwt: JwtSettings::from_env()?,
            session: SessionSettings::from_env()?,
            identity_provider: IdentityProviderSettings::from_env()?,
            rate_limit: RateLimitSettings::from_env()?,
        })
    }
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            acquire_timeout: env::var("DATABASE_ACQUIRE_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_ACQUIRE_TIMEOUT")?,
        })
    }
}

/// JWT signing and validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    /// Clock-skew tolerance applied during validation.
    pub leeway_secs: u64,
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        let settings = Self {
            secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "quillbox-api".to_string()),
            audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "quillbox-extension".to_string()),
            access_ttl_secs: env::var("JWT_ACCESS_TTL_SECS")
                .unwrap_or_else(|_| "900".to_string()) // 15 minutes
                .parse()
                .context("Invalid JWT_ACCESS_TTL_SECS")?,
            refresh_ttl_secs: env::var("JWT_REFRESH_TTL_SECS")
                .unwrap_or_else(|_| "2592000".to_string()) // 30 days
                .parse()
                .context("Invalid JWT_REFRESH_TTL_SECS")?,
            leeway_secs: env::var("JWT_LEEWAY_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid JWT_LEEWAY_SECS")?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.secret.len() >= 32,
            "JWT_SECRET too weak - minimum 32 bytes required"
        );
        ensure!(
            self.access_ttl_secs < self.refresh_ttl_secs,
            "access token TTL ({}) must be shorter than refresh token TTL ({})",
            self.access_ttl_secs,
            self.refresh_ttl_secs
        );
        Ok(())
    }
}

/// Concurrent-session policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Maximum concurrent active sessions per user. A soft limit; see
    /// `SessionLifecycleManager` for the documented race window.
    pub max_sessions: usize,
}

impl SessionSettings {
    fn from_env() -> Result<Self> {
        let settings = Self {
            max_sessions: env::var("SESSION_MAX_PER_USER")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid SESSION_MAX_PER_USER")?,
        };
        ensure!(settings.max_sessions >= 1, "SESSION_MAX_PER_USER must be at least 1");
        Ok(settings)
    }
}

/// External identity provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProviderSettings {
    /// Introspection/userinfo endpoint queried with the external bearer token.
    pub userinfo_url: String,
    pub request_timeout_secs: u64,
    /// How long a verified identity is cached.
    pub cache_ttl_secs: u64,
    /// Assumed validity of the external token when the provider does not
    /// report one. The cache TTL must stay strictly below this.
    pub token_lifetime_secs: u64,
}

impl IdentityProviderSettings {
    fn from_env() -> Result<Self> {
        let settings = Self {
            userinfo_url: env::var("IDENTITY_USERINFO_URL").unwrap_or_else(|_| {
                "https://openidconnect.googleapis.com/v1/userinfo".to_string()
            }),
            request_timeout_secs: env::var("IDENTITY_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid IDENTITY_REQUEST_TIMEOUT_SECS")?,
            cache_ttl_secs: env::var("IDENTITY_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "3000".to_string()) // 50 minutes
                .parse()
                .context("Invalid IDENTITY_CACHE_TTL_SECS")?,
            token_lifetime_secs: env::var("IDENTITY_TOKEN_LIFETIME_SECS")
                .unwrap_or_else(|_| "3600".to_string()) // 60 minutes
                .parse()
                .context("Invalid IDENTITY_TOKEN_LIFETIME_SECS")?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.cache_ttl_secs < self.token_lifetime_secs,
            "identity cache TTL ({}) must be strictly shorter than the external token lifetime ({})",
            self.cache_ttl_secs,
            self.token_lifetime_secs
        );
        ensure!(
            self.request_timeout_secs >= 1,
            "IDENTITY_REQUEST_TIMEOUT_SECS must be at least 1"
        );
        Ok(())
    }
}

/// Rate limiter budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub global_per_minute: f64,
    pub global_burst: f64,
    pub per_caller_per_minute: f64,
    pub per_caller_burst: f64,
    pub auth_per_minute: f64,
    pub auth_burst: f64,
    pub search_per_minute: f64,
    pub search_burst: f64,
    /// Comma-separated user UUIDs that bypass all tiers.
    pub whitelist_users: HashSet<Uuid>,
    /// Comma-separated IPs that bypass all tiers.
    pub whitelist_ips: HashSet<String>,
}

impl RateLimitSettings {
    fn from_env() -> Result<Self> {
        let whitelist_users = env::var("RATE_LIMIT_WHITELIST_USERS")
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| Uuid::parse_str(s.trim()).context("Invalid UUID in RATE_LIMIT_WHITELIST_USERS"))
            .collect::<Result<HashSet<_>>>()?;

        let whitelist_ips = env::var("RATE_LIMIT_WHITELIST_IPS")
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
            .collect();

        Ok(Self {
            global_per_minute: parse_f64("RATE_LIMIT_GLOBAL_PER_MINUTE", "6000")?,
            global_burst: parse_f64("RATE_LIMIT_GLOBAL_BURST", "200")?,
            per_caller_per_minute: parse_f64("RATE_LIMIT_PER_CALLER_PER_MINUTE", "120")?,
            per_caller_burst: parse_f64("RATE_LIMIT_PER_CALLER_BURST", "30")?,
            auth_per_minute: parse_f64("RATE_LIMIT_AUTH_PER_MINUTE", "10")?,
            auth_burst: parse_f64("RATE_LIMIT_AUTH_BURST", "5")?,
            search_per_minute: parse_f64("RATE_LIMIT_SEARCH_PER_MINUTE", "30")?,
            search_burst: parse_f64("RATE_LIMIT_SEARCH_BURST", "10")?,
            whitelist_users,
            whitelist_ips,
        })
    }

    /// Build the limiter configuration consumed by the HTTP layer.
    pub fn to_config(&self) -> RateLimitConfig {
        let mut config = RateLimitConfig {
            global: BucketPolicy::per_minute(self.global_per_minute, self.global_burst),
            per_caller: BucketPolicy::per_minute(self.per_caller_per_minute, self.per_caller_burst),
            class_overrides: Default::default(),
            whitelist_users: self.whitelist_users.clone(),
            whitelist_ips: self.whitelist_ips.clone(),
        };
        config.class_overrides.insert(
            EndpointClass::Auth,
            BucketPolicy::per_minute(self.auth_per_minute, self.auth_burst),
        );
        config.class_overrides.insert(
            EndpointClass::Search,
            BucketPolicy::per_minute(self.search_per_minute, self.search_burst),
        );
        config
    }
}

fn parse_f64(var: &str, default: &str) -> Result<f64> {
    env::var(var)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("Invalid {}", var))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_settings() -> JwtSettings {
        JwtSettings {
            secret: "0123456789abcdef0123456789abcdef".to_string(),
            issuer: "quillbox-api".to_string(),
            audience: "quillbox-extension".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 2_592_000,
            leeway_secs: 30,
        }
    }

    #[test]
    fn access_ttl_must_be_shorter_than_refresh_ttl() {
        let mut settings = jwt_settings();
        assert!(settings.validate().is_ok());

        settings.access_ttl_secs = settings.refresh_ttl_secs;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn weak_jwt_secret_is_rejected() {
        let mut settings = jwt_settings();
        settings.secret = "short".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn cache_ttl_must_stay_below_token_lifetime() {
        let mut settings = IdentityProviderSettings {
            userinfo_url: "https://example.test/userinfo".to_string(),
            request_timeout_secs: 5,
            cache_ttl_secs: 3000,
            token_lifetime_secs: 3600,
        };
        assert!(settings.validate().is_ok());

        settings.cache_ttl_secs = 3600;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rate_limit_settings_build_limiter_config() {
        let settings = RateLimitSettings {
            global_per_minute: 6000.0,
            global_burst: 200.0,
            per_caller_per_minute: 120.0,
            per_caller_burst: 30.0,
            auth_per_minute: 10.0,
            auth_burst: 5.0,
            search_per_minute: 30.0,
            search_burst: 10.0,
            whitelist_users: HashSet::new(),
            whitelist_ips: HashSet::new(),
        };

        let config = settings.to_config();
        assert_eq!(config.per_caller.capacity, 30.0);
        assert!(config.class_overrides.contains_key(&EndpointClass::Auth));
        assert!(config.class_overrides.contains_key(&EndpointClass::Search));
    }
}
