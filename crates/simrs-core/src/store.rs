//! 협력자 계약.
//!
//! 사용자/역할/권한/세션의 영구 저장, 감사 로그 기록, 비밀번호 해싱은 인증 코어 밖의
//! 책임입니다. 코어는 아래 trait만 알고, 구현은 API 크레이트(PostgreSQL, 인메모리)가 제공합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AuditEvent, LoginSession, OverrideEffect, Permission, Role, User, UserPermissionOverride,
};
use crate::error::{AuditError, PasswordError, StoreResult};

/// 사용자 조회.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// ID로 사용자 조회.
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// 로그인 이름으로 사용자 조회.
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// 마지막 로그인 시간 기록.
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    /// 사용자에게 할당된 역할 목록 (이름순).
    async fn roles_of(&self, id: Uuid) -> StoreResult<Vec<Role>>;
}

/// 로그인 세션 저장소.
///
/// 세션은 물리적으로 삭제되지 않으며, 폐기는 `revoked_at`이 NULL인 행에만 적용됩니다.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 새 세션 저장.
    async fn insert(&self, session: &LoginSession) -> StoreResult<()>;

    /// ID로 세션 조회 (폐기 여부와 무관).
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<LoginSession>>;

    /// 리프레시 토큰 해시로 세션 조회.
    async fn find_by_refresh_hash(&self, hash: &str) -> StoreResult<Option<LoginSession>>;

    /// 사용자의 세션 목록 (최근 활동 순).
    async fn list_by_user(&self, user_id: Uuid, active_only: bool)
        -> StoreResult<Vec<LoginSession>>;

    // === 변경 ===

    /// 마지막 활동 시간 갱신.
    async fn update_last_seen(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    /// 저장된 해시가 `expected`와 같고 세션이 활성일 때만 `new_hash`로 교체.
    ///
    /// 교체되면 `true`. 동시에 같은 리프레시 토큰을 사용한 두 요청 중 하나만 성공합니다.
    async fn rotate_refresh_hash(
        &self,
        id: Uuid,
        expected: &str,
        new_hash: &str,
    ) -> StoreResult<bool>;

    /// 활성 세션을 폐기. 이미 폐기되었거나 없으면 `false`.
    async fn revoke(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;

    /// 사용자의 모든 활성 세션 폐기. 폐기된 세션 수 반환.
    async fn revoke_all_by_user(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<u64>;
}

/// 역할/권한/오버라이드 조회 및 오버라이드 관리.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// 사용자 역할을 통해 도달 가능한 권한 코드 (중복 제거).
    async fn role_permission_codes(&self, user_id: Uuid) -> StoreResult<Vec<String>>;

    /// 사용자의 모든 오버라이드 (코드순).
    async fn user_overrides(&self, user_id: Uuid) -> StoreResult<Vec<UserPermissionOverride>>;

    /// 역할 중 하나가 해당 코드를 부여하는지 확인.
    async fn role_grants(&self, user_id: Uuid, code: &str) -> StoreResult<bool>;

    /// 해당 코드에 대한 사용자 오버라이드.
    async fn override_for(&self, user_id: Uuid, code: &str)
        -> StoreResult<Option<OverrideEffect>>;

    /// 코드로 권한 정의 조회.
    async fn find_permission_by_code(&self, code: &str) -> StoreResult<Option<Permission>>;

    /// 오버라이드 upsert. 이전 효과를 반환합니다.
    async fn set_override(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        effect: OverrideEffect,
    ) -> StoreResult<Option<OverrideEffect>>;

    /// 오버라이드 제거. 제거된 효과를 반환합니다.
    async fn remove_override(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
    ) -> StoreResult<Option<OverrideEffect>>;
}

/// 감사 이벤트 기록기.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// 단방향 비밀번호 해싱.
pub trait CredentialHasher: Send + Sync {
    /// 평문 비밀번호를 해싱합니다.
    fn hash(&self, password: &str) -> Result<String, PasswordError>;

    /// 평문 비밀번호가 저장된 해시와 일치하는지 확인합니다.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError>;
}
