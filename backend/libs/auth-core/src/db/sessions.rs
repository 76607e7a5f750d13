//! Postgres session store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Session;
use crate::storage::SessionStore;

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, user_id, ip_address, user_agent,
                access_token_jti, refresh_token_jti,
                created_at, last_activity_at, active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(&session.access_token_jti)
        .bind(&session.refresh_token_jti)
        .bind(session.created_at)
        .bind(session.last_activity_at)
        .bind(session.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, ip_address, user_agent,
                   access_token_jti, refresh_token_jti,
                   created_at, last_activity_at, active
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, ip_address, user_agent,
                   access_token_jti, refresh_token_jti,
                   created_at, last_activity_at, active
            FROM sessions
            WHERE user_id = $1 AND active = TRUE
            ORDER BY last_activity_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    async fn deactivate(&self, session_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sessions SET active = FALSE WHERE id = $1
            "#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn touch(&self, session_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sessions SET last_activity_at = $1 WHERE id = $2
            "#,
        )
        .bind(at)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_token_ids(
        &self,
        session_id: Uuid,
        access_jti: &str,
        refresh_jti: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET access_token_jti = $1, refresh_token_jti = $2
            WHERE id = $3
            "#,
        )
        .bind(access_jti)
        .bind(refresh_jti)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
