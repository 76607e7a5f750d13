//! Access/refresh token issuance and validation
//!
//! This module is deliberately storage-free: it verifies signature, expiry,
//! issuer/audience, and claim shape, and nothing else. Blacklist and
//! session-existence checks are the orchestrator's job, which keeps this half
//! exhaustively unit-testable without a database.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::error::{AuthError, Result};

/// Maximum tolerated future skew on `iat` before a token is treated as
/// tampered with.
const MAX_IAT_FUTURE_SKEW_SECS: i64 = 300;

/// JWT claims for both token types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Session identifier this token was minted for
    pub sid: String,
    /// Unique token identifier, used for blacklist lookups
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    /// "access" or "refresh"
    pub token_type: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::MalformedToken)
    }

    pub fn session_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sid).map_err(|_| AuthError::MalformedToken)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// A freshly minted token pair.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    #[serde(skip)]
    pub access_jti: String,
    #[serde(skip)]
    pub refresh_jti: String,
}

/// Signs and validates token pairs with the configured HS256 secret.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    leeway_secs: u64,
}

impl TokenService {
    pub fn new(settings: &JwtSettings) -> Result<Self> {
        settings
            .validate()
            .map_err(|e| AuthError::Configuration(e.to_string()))?;

        Ok(Self {
            encoding: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding: DecodingKey::from_secret(settings.secret.as_bytes()),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            access_ttl: Duration::seconds(settings.access_ttl_secs as i64),
            refresh_ttl: Duration::seconds(settings.refresh_ttl_secs as i64),
            leeway_secs: settings.leeway_secs,
        })
    }

    /// Issue a new access+refresh pair for a user's session.
    pub fn issue_pair(&self, user_id: Uuid, session_id: Uuid) -> Result<IssuedPair> {
        self.issue_pair_at(user_id, session_id, Utc::now())
    }

    pub(crate) fn issue_pair_at(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedPair> {
        let (access_token, access_jti) = self.sign(user_id, session_id, TokenKind::Access, now)?;
        let (refresh_token, refresh_jti) = self.sign(user_id, session_id, TokenKind::Refresh, now)?;

        debug!(user_id = %user_id, session_id = %session_id, "issued token pair");
        Ok(IssuedPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds(),
            access_jti,
            refresh_jti,
        })
    }

    /// Validate an access token's signature, expiry, and claim shape.
    pub fn validate_access(&self, token: &str) -> Result<Claims> {
        self.validate(token, TokenKind::Access)
    }

    /// Validate a refresh token; same checks against the refresh expiry.
    pub fn validate_refresh(&self, token: &str) -> Result<Claims> {
        self.validate(token, TokenKind::Refresh)
    }

    /// Worst-case remaining lifetime of any outstanding token, used when
    /// blacklisting by jti without the original token in hand.
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn sign(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<(String, String)> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let jti = Uuid::new_v4().to_string();
        let claims = Claims {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            jti: jti.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            token_type: kind.as_str().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {}", e)))?;
        Ok((token, jti))
    }

    fn validate(&self, token: &str, kind: TokenKind) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        let claims = data.claims;

        if claims.token_type != kind.as_str() {
            return Err(AuthError::MalformedToken);
        }
        if claims.jti.trim().is_empty() {
            return Err(AuthError::MalformedToken);
        }
        if claims.iat > Utc::now().timestamp() + MAX_IAT_FUTURE_SKEW_SECS {
            return Err(AuthError::MalformedToken);
        }

        Ok(claims)
    }
}
