use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Bad token signature")]
    BadSignature,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("External identity not verified: {0}")]
    IdentityUnverified(String),

    #[error("External identity response malformed: {0}")]
    IdentityMalformed(String),

    #[error("Identity provider unreachable: {0}")]
    IdentityUnreachable(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable reason string the extension client branches on (e.g. force
    /// re-login vs. silent retry). These are part of the API contract; do not
    /// rename them.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::BadSignature => "bad_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenRevoked => "token_revoked",
            AuthError::RateLimited { .. } => "rate_limited",
            AuthError::IdentityUnverified(_) => "identity_unverified",
            AuthError::IdentityMalformed(_) => "identity_malformed",
            AuthError::IdentityUnreachable(_) => "identity_unreachable",
            AuthError::UserNotFound => "user_not_found",
            AuthError::SessionNotFound => "session_not_found",
            AuthError::Database(_) => "storage_error",
            AuthError::Configuration(_) => "configuration_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Client errors are surfaced with their reason code and never logged as
    /// system failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AuthError::MissingToken
                | AuthError::MalformedToken
                | AuthError::BadSignature
                | AuthError::TokenExpired
                | AuthError::TokenRevoked
                | AuthError::RateLimited { .. }
                | AuthError::IdentityUnverified(_)
                | AuthError::IdentityMalformed(_)
        )
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        AuthError::Database(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidSignature => AuthError::BadSignature,
            _ => AuthError::MalformedToken,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::IdentityUnreachable("request timed out".to_string())
        } else {
            AuthError::IdentityUnreachable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_error_kinds_map_to_specific_reasons() {
        use jsonwebtoken::errors::{Error, ErrorKind};

        let expired: AuthError = Error::from(ErrorKind::ExpiredSignature).into();
        assert_eq!(expired.reason_code(), "token_expired");

        let bad_sig: AuthError = Error::from(ErrorKind::InvalidSignature).into();
        assert_eq!(bad_sig.reason_code(), "bad_signature");

        let garbage: AuthError = Error::from(ErrorKind::InvalidToken).into();
        assert_eq!(garbage.reason_code(), "malformed_token");
    }

    #[test]
    fn client_errors_are_classified() {
        assert!(AuthError::TokenExpired.is_client_error());
        assert!(AuthError::MissingToken.is_client_error());
        assert!(!AuthError::Database("down".into()).is_client_error());
        assert!(!AuthError::IdentityUnreachable("timeout".into()).is_client_error());
    }
}
