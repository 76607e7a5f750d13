use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One authenticated client instance, independent of any single token.
///
/// Sessions are deactivated on logout or eviction, never hard-deleted, so the
/// row doubles as audit history.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ip_address: Option<String>,
    /// Client descriptor, typically the user-agent string.
    pub user_agent: Option<String>,
    /// jti of the most recently issued access token for this session.
    pub access_token_jti: Option<String>,
    /// jti of the most recently issued refresh token for this session.
    pub refresh_token_jti: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub active: bool,
}

impl Session {
    pub fn new(user_id: Uuid, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            ip_address,
            user_agent,
            access_token_jti: None,
            refresh_token_jti: None,
            created_at: now,
            last_activity_at: now,
            active: true,
        }
    }
}
