use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a token identifier was blacklisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    Logout,
    ForcedRevocation,
    SecurityEvent,
}

impl RevocationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationReason::Logout => "logout",
            RevocationReason::ForcedRevocation => "forced_revocation",
            RevocationReason::SecurityEvent => "security_event",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "logout" => Some(RevocationReason::Logout),
            "forced_revocation" => Some(RevocationReason::ForcedRevocation),
            "security_event" => Some(RevocationReason::SecurityEvent),
            _ => None,
        }
    }
}

/// A blacklisted token identifier.
///
/// Stores the jti embedded in the token's claims, not the raw token, so a
/// revocation check never needs the token's cryptographic content. Once
/// `expires_at` passes the entry is dead weight and may be garbage-collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedToken {
    pub jti: String,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub reason: RevocationReason,
    pub revoked_at: DateTime<Utc>,
}
