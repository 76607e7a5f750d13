//! Postgres revocation store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::RevokedToken;
use crate::storage::RevocationStore;

pub struct PgRevocationStore {
    pool: PgPool,
}

impl PgRevocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationStore for PgRevocationStore {
    async fn insert(&self, entry: &RevokedToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO token_revocations (jti, user_id, session_id, expires_at, reason, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (jti) DO UPDATE SET
                expires_at = EXCLUDED.expires_at,
                reason = EXCLUDED.reason,
                revoked_at = EXCLUDED.revoked_at
            "#,
        )
        .bind(&entry.jti)
        .bind(entry.user_id)
        .bind(entry.session_id)
        .bind(entry.expires_at)
        .bind(entry.reason.as_str())
        .bind(entry.revoked_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn contains(&self, jti: &str, now: DateTime<Utc>) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM token_revocations
            WHERE jti = $1 AND expires_at > $2
            "#,
        )
        .bind(jti)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM token_revocations WHERE expires_at < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
