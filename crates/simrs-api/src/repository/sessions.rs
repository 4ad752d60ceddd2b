//! 로그인 세션 저장소.
//!
//! 세션 행은 삭제하지 않습니다. 폐기와 리프레시 해시 교체는 모두
//! `revoked_at IS NULL` 조건을 가진 단일 UPDATE로 수행되어 원자적입니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use simrs_core::{LoginSession, SessionStore, StoreResult};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL 세션 저장소.
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SessionRepository {
    async fn insert(&self, session: &LoginSession) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO login_sessions (
                id, user_id, refresh_token_hash, device_info, ip_address,
                created_at, last_seen_at, revoked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.refresh_token_hash)
        .bind(&session.device_info)
        .bind(&session.ip_address)
        .bind(session.created_at)
        .bind(session.last_seen_at)
        .bind(session.revoked_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<LoginSession>> {
        let session = sqlx::query_as::<_, LoginSession>(
            r#"
            SELECT id, user_id, refresh_token_hash, device_info, ip_address,
                   created_at, last_seen_at, revoked_at
            FROM login_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn find_by_refresh_hash(&self, hash: &str) -> StoreResult<Option<LoginSession>> {
        let session = sqlx::query_as::<_, LoginSession>(
            r#"
            SELECT id, user_id, refresh_token_hash, device_info, ip_address,
                   created_at, last_seen_at, revoked_at
            FROM login_sessions
            WHERE refresh_token_hash = $1
            "#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> StoreResult<Vec<LoginSession>> {
        let sessions = sqlx::query_as::<_, LoginSession>(
            r#"
            SELECT id, user_id, refresh_token_hash, device_info, ip_address,
                   created_at, last_seen_at, revoked_at
            FROM login_sessions
            WHERE user_id = $1
              AND ($2 = FALSE OR revoked_at IS NULL)
            ORDER BY last_seen_at DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    async fn update_last_seen(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE login_sessions SET last_seen_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn rotate_refresh_hash(
        &self,
        id: Uuid,
        expected: &str,
        new_hash: &str,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE login_sessions
            SET refresh_token_hash = $3
            WHERE id = $1
              AND refresh_token_hash = $2
              AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE login_sessions
            SET revoked_at = $2
            WHERE id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all_by_user(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE login_sessions
            SET revoked_at = $2
            WHERE user_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
