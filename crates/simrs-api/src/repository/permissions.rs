//! 권한 저장소.
//!
//! 역할 권한과 사용자 오버라이드 조회, 오버라이드 upsert/삭제를 담당합니다.
//! 오버라이드 효과는 `'GRANT'` / `'REVOKE'` 텍스트로 저장됩니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use simrs_core::{
    OverrideEffect, Permission, PermissionStore, StoreError, StoreResult, UserPermissionOverride,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// user_permissions 조인 결과.
#[derive(Debug, FromRow)]
struct OverrideRow {
    user_id: Uuid,
    permission_id: Uuid,
    code: String,
    effect: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OverrideRow> for UserPermissionOverride {
    type Error = StoreError;

    fn try_from(row: OverrideRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: row.user_id,
            permission_id: row.permission_id,
            code: row.code,
            effect: parse_effect(&row.effect)?,
            created_at: row.created_at,
        })
    }
}

fn parse_effect(raw: &str) -> StoreResult<OverrideEffect> {
    raw.parse()
        .map_err(|e: simrs_core::ParseOverrideEffectError| StoreError::Corrupted(e.to_string()))
}

/// PostgreSQL 권한 저장소.
#[derive(Clone)]
pub struct PermissionRepository {
    pool: PgPool,
}

impl PermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for PermissionRepository {
    async fn role_permission_codes(&self, user_id: Uuid) -> StoreResult<Vec<String>> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT p.code
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            JOIN user_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = $1
            ORDER BY p.code
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }

    async fn user_overrides(&self, user_id: Uuid) -> StoreResult<Vec<UserPermissionOverride>> {
        let rows = sqlx::query_as::<_, OverrideRow>(
            r#"
            SELECT o.user_id, o.permission_id, p.code, o.effect, o.created_at
            FROM user_permissions o
            JOIN permissions p ON p.id = o.permission_id
            WHERE o.user_id = $1
            ORDER BY p.code
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserPermissionOverride::try_from).collect()
    }

    async fn role_grants(&self, user_id: Uuid, code: &str) -> StoreResult<bool> {
        let granted = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM permissions p
                JOIN role_permissions rp ON rp.permission_id = p.id
                JOIN user_roles ur ON ur.role_id = rp.role_id
                WHERE ur.user_id = $1 AND p.code = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(code)
        .fetch_one(&self.pool)
        .await?;

        Ok(granted)
    }

    async fn override_for(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> StoreResult<Option<OverrideEffect>> {
        let effect = sqlx::query_scalar::<_, String>(
            r#"
            SELECT o.effect
            FROM user_permissions o
            JOIN permissions p ON p.id = o.permission_id
            WHERE o.user_id = $1 AND p.code = $2
            "#,
        )
        .bind(user_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        effect.as_deref().map(parse_effect).transpose()
    }

    async fn find_permission_by_code(&self, code: &str) -> StoreResult<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(
            "SELECT id, code, description FROM permissions WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(permission)
    }

    async fn set_override(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        effect: OverrideEffect,
    ) -> StoreResult<Option<OverrideEffect>> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, String>(
            r#"
            SELECT effect FROM user_permissions
            WHERE user_id = $1 AND permission_id = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(permission_id)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO user_permissions (user_id, permission_id, effect, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, permission_id)
            DO UPDATE SET effect = EXCLUDED.effect, created_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(permission_id)
        .bind(effect.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        previous.as_deref().map(parse_effect).transpose()
    }

    async fn remove_override(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
    ) -> StoreResult<Option<OverrideEffect>> {
        let removed = sqlx::query_scalar::<_, String>(
            r#"
            DELETE FROM user_permissions
            WHERE user_id = $1 AND permission_id = $2
            RETURNING effect
            "#,
        )
        .bind(user_id)
        .bind(permission_id)
        .fetch_optional(&self.pool)
        .await?;

        removed.as_deref().map(parse_effect).transpose()
    }
}
