//! 인증 서비스.
//!
//! 라우트 핸들러가 호출하는 유스케이스 계층입니다. 자격 증명 확인, 세션 관리자 호출,
//! 권한 오버라이드 관리, 감사 이벤트 기록을 조합합니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use simrs_core::{
    AuditEvent, AuditSink, CredentialHasher, LoginSession, OverrideEffect, Permission,
    PermissionStore, Role, User, UserStore,
};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::AuthError;
use super::jwt::TokenPair;
use super::middleware::AuthContext;
use super::permissions::{PermissionCache, PermissionResolver};
use super::session::SessionManager;
use super::throttle::LastSeenThrottle;
use crate::metrics::record_login;

/// 다른 사용자의 세션을 폐기할 수 있는 권한.
pub const SESSION_REVOKE_PERMISSION: &str = "session.revoke";

/// 사용자별 권한 오버라이드를 관리할 수 있는 권한.
pub const PERMISSION_MANAGE_PERMISSION: &str = "permission.manage";

// ==================== 응답 모델 ====================

/// 사용자 프로필 (역할과 유효 권한 포함).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub roles: Vec<Role>,
    /// 유효 권한 코드 (정렬됨)
    pub permissions: Vec<String>,
}

impl UserProfile {
    fn assemble(user: User, roles: Vec<Role>, permissions: impl IntoIterator<Item = String>) -> Self {
        let mut permissions: Vec<String> = permissions.into_iter().collect();
        permissions.sort();

        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_active: user.is_active,
            last_login_at: user.last_login_at,
            roles,
            permissions,
        }
    }
}

/// 로그인 응답의 세션 요약.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionBrief {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// 로그인 결과.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginOutcome {
    pub user: UserProfile,
    pub tokens: TokenPair,
    pub session: SessionBrief,
}

/// 세션 목록 항목.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionView {
    pub id: Uuid,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// 요청을 보낸 세션인지 여부
    pub is_current: bool,
}

impl SessionView {
    fn from_session(session: LoginSession, current: Uuid) -> Self {
        Self {
            is_active: session.is_active(),
            is_current: session.id == current,
            id: session.id,
            device_info: session.device_info,
            ip_address: session.ip_address,
            created_at: session.created_at,
            last_seen_at: session.last_seen_at,
            revoked_at: session.revoked_at,
        }
    }
}

/// 오버라이드 변경 결과.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OverrideChange {
    pub user_id: Uuid,
    pub code: String,
    pub previous: Option<OverrideEffect>,
    pub current: Option<OverrideEffect>,
}

// ==================== 서비스 ====================

/// 인증 유스케이스.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    permissions: Arc<dyn PermissionStore>,
    sessions: SessionManager,
    resolver: PermissionResolver,
    hasher: Arc<dyn CredentialHasher>,
    audit: Arc<dyn AuditSink>,
    throttle: Arc<LastSeenThrottle>,
}

impl AuthService {
    /// `throttle`은 인증 가드와 같은 인스턴스여야 폐기된 세션 항목이 정리됩니다.
    pub fn new(
        users: Arc<dyn UserStore>,
        permissions: Arc<dyn PermissionStore>,
        sessions: SessionManager,
        hasher: Arc<dyn CredentialHasher>,
        audit: Arc<dyn AuditSink>,
        throttle: Arc<LastSeenThrottle>,
    ) -> Self {
        let resolver = PermissionResolver::new(permissions.clone());
        Self {
            users,
            permissions,
            sessions,
            resolver,
            hasher,
            audit,
            throttle,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    /// 자격 증명을 확인하고 새 세션을 발급합니다.
    ///
    /// 없는 사용자와 틀린 비밀번호는 같은 에러로 응답합니다. 비활성 여부는
    /// 비밀번호가 맞은 뒤에만 알려줍니다.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        device_info: Option<String>,
        client_addr: Option<String>,
    ) -> Result<LoginOutcome, AuthError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            record_login("invalid_credentials");
            tracing::info!(username = %username, "Login failed: unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_password(password, &user.password_hash).await? {
            record_login("invalid_credentials");
            tracing::info!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            record_login("inactive");
            tracing::info!(user_id = %user.id, "Login rejected: user inactive");
            return Err(AuthError::UserInactive);
        }

        let issued = self
            .sessions
            .create_session(user.id, device_info, client_addr)
            .await?;

        let now = Utc::now();
        self.users.record_login(user.id, now).await?;

        let roles = self.users.roles_of(user.id).await?;
        let permissions = self.resolver.effective_permissions(user.id).await?;

        let mut user = user;
        user.last_login_at = Some(now);

        record_login("success");
        tracing::info!(user_id = %user.id, session_id = %issued.session.id, "Login succeeded");

        Ok(LoginOutcome {
            user: UserProfile::assemble(user, roles, permissions),
            tokens: issued.tokens,
            session: SessionBrief {
                id: issued.session.id,
                created_at: issued.session.created_at,
            },
        })
    }

    /// argon2 검증은 CPU 집약적이므로 blocking 풀에서 실행합니다.
    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .map_err(AuthError::from)
    }

    /// 리프레시 토큰 교체.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        Ok(self.sessions.refresh_tokens(refresh_token).await?.tokens)
    }

    /// 현재 사용자 프로필. 요청 캐시를 통해 유효 권한을 한 번만 로드합니다.
    pub async fn profile(
        &self,
        cache: &mut PermissionCache,
        context: &AuthContext,
    ) -> Result<UserProfile, AuthError> {
        let user = self
            .users
            .find_by_id(context.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let roles = self.users.roles_of(user.id).await?;
        let permissions = self
            .resolver
            .effective_permissions_cached(cache, user.id)
            .await
            .map_err(|e| AuthError::PermissionCheckFailed(e.to_string()))?;

        Ok(UserProfile::assemble(user, roles, permissions))
    }

    /// 현재 세션 로그아웃.
    pub async fn logout(
        &self,
        context: &AuthContext,
        client_addr: Option<String>,
    ) -> Result<(), AuthError> {
        self.sessions.revoke(context.session_id).await?;
        self.throttle.forget(context.session_id).await;

        self.emit(
            AuditEvent::update(
                "auth",
                "login_sessions",
                context.session_id.to_string(),
                "logout",
            )
            .with_actor(context.user_id)
            .with_ip(client_addr)
            .with_change(
                Some(json!({ "revoked_at": null })),
                Some(json!({ "revoked_at": Utc::now() })),
            ),
        )
        .await;
        Ok(())
    }

    /// 요청자의 세션 목록 (최근 활동 순).
    pub async fn list_sessions(
        &self,
        context: &AuthContext,
        active_only: bool,
    ) -> Result<Vec<SessionView>, AuthError> {
        let sessions = if active_only {
            self.sessions.list_active(context.user_id).await?
        } else {
            self.sessions.list_all(context.user_id).await?
        };

        Ok(sessions
            .into_iter()
            .map(|s| SessionView::from_session(s, context.session_id))
            .collect())
    }

    /// 세션 하나를 폐기합니다.
    ///
    /// 소유자는 항상 가능하고, 다른 사용자의 세션은 `session.revoke` 권한이 필요합니다.
    /// 권한 없이 다른 사용자의 세션을 지정하면 존재하지 않는 세션과 같은 응답을 받습니다.
    pub async fn revoke_session(
        &self,
        cache: &mut PermissionCache,
        context: &AuthContext,
        session_id: Uuid,
        client_addr: Option<String>,
    ) -> Result<(), AuthError> {
        let session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if !session.is_owned_by(context.user_id) {
            let allowed = self
                .resolver
                .has_permission(cache, context.user_id, SESSION_REVOKE_PERMISSION)
                .await
                .map_err(|e| AuthError::PermissionCheckFailed(e.to_string()))?;
            if !allowed {
                tracing::warn!(
                    user_id = %context.user_id,
                    session_id = %session_id,
                    "Revoke of foreign session denied"
                );
                return Err(AuthError::SessionNotFound);
            }
        }

        self.sessions.revoke(session_id).await?;
        self.throttle.forget(session_id).await;

        self.emit(
            AuditEvent::update("auth", "login_sessions", session_id.to_string(), "session revoked")
                .with_actor(context.user_id)
                .with_ip(client_addr)
                .with_business_key(session.user_id.to_string())
                .with_change(
                    Some(json!({ "revoked_at": null })),
                    Some(json!({ "revoked_at": Utc::now() })),
                ),
        )
        .await;
        Ok(())
    }

    /// 사용자의 모든 활성 세션을 폐기합니다. 폐기된 수를 반환합니다.
    pub async fn revoke_all_for_user(
        &self,
        context: &AuthContext,
        user_id: Uuid,
        client_addr: Option<String>,
    ) -> Result<u64, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let active = self.sessions.list_active(user.id).await?;
        let revoked = self.sessions.revoke_all(user.id).await?;
        for session in &active {
            self.throttle.forget(session.id).await;
        }

        self.emit(
            AuditEvent::update("auth", "login_sessions", user.id.to_string(), "all sessions revoked")
                .with_actor(context.user_id)
                .with_ip(client_addr)
                .with_business_key(user.username)
                .with_change(None, Some(json!({ "revoked": revoked }))),
        )
        .await;
        Ok(revoked)
    }

    /// 사용자 권한 오버라이드 설정 (upsert).
    pub async fn set_override(
        &self,
        context: &AuthContext,
        user_id: Uuid,
        code: &str,
        effect: OverrideEffect,
        client_addr: Option<String>,
    ) -> Result<OverrideChange, AuthError> {
        let (user, permission_id) = self.override_target(user_id, code).await?;

        let previous = self
            .permissions
            .set_override(user.id, permission_id, effect)
            .await?;

        tracing::info!(
            actor_id = %context.user_id,
            user_id = %user.id,
            code = %code,
            effect = %effect,
            "Permission override set"
        );

        self.emit(
            AuditEvent::update(
                "permission",
                "user_permissions",
                format!("{}:{}", user.id, permission_id),
                "permission override set",
            )
            .with_actor(context.user_id)
            .with_ip(client_addr)
            .with_business_key(format!("{}:{}", user.username, code))
            .with_change(
                previous.map(|p| json!({ "effect": p })),
                Some(json!({ "effect": effect })),
            ),
        )
        .await;

        Ok(OverrideChange {
            user_id: user.id,
            code: code.to_string(),
            previous,
            current: Some(effect),
        })
    }

    /// 사용자 권한 오버라이드 제거. 역할 기반 판정으로 돌아갑니다.
    pub async fn remove_override(
        &self,
        context: &AuthContext,
        user_id: Uuid,
        code: &str,
        client_addr: Option<String>,
    ) -> Result<OverrideChange, AuthError> {
        let (user, permission_id) = self.override_target(user_id, code).await?;

        let previous = self
            .permissions
            .remove_override(user.id, permission_id)
            .await?;

        if let Some(removed) = previous {
            tracing::info!(
                actor_id = %context.user_id,
                user_id = %user.id,
                code = %code,
                "Permission override removed"
            );

            self.emit(
                AuditEvent::delete(
                    "permission",
                    "user_permissions",
                    format!("{}:{}", user.id, permission_id),
                    "permission override removed",
                )
                .with_actor(context.user_id)
                .with_ip(client_addr)
                .with_business_key(format!("{}:{}", user.username, code))
                .with_change(Some(json!({ "effect": removed })), None),
            )
            .await;
        }

        Ok(OverrideChange {
            user_id: user.id,
            code: code.to_string(),
            previous,
            current: None,
        })
    }

    async fn override_target(&self, user_id: Uuid, code: &str) -> Result<(User, Uuid), AuthError> {
        if !Permission::is_valid_code(code) {
            return Err(AuthError::Validation(format!(
                "권한 코드는 domain.action 형식이어야 합니다: {code}"
            )));
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let permission = self
            .permissions
            .find_permission_by_code(code)
            .await?
            .ok_or_else(|| AuthError::PermissionNotFound(code.to_string()))?;
        Ok((user, permission.id))
    }

    /// 감사 이벤트 기록. 변경은 이미 반영되었으므로 실패는 로그로만 남깁니다.
    async fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(&event).await {
            tracing::error!(
                error = %e,
                table = %event.table,
                primary_key = %event.primary_key,
                "Failed to record audit event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::auth::jwt::TokenCodec;
    use crate::auth::password::Argon2Hasher;
    use crate::repository::MemoryStore;
    use secrecy::SecretString;
    use simrs_core::AuditAction;

    struct Fixture {
        store: Arc<MemoryStore>,
        audit: Arc<MemoryAuditSink>,
        throttle: Arc<LastSeenThrottle>,
        service: AuthService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let codec = TokenCodec::new(
            &SecretString::from("service-test-secret-0123456789abcdef".to_string()),
            chrono::Duration::minutes(15),
            chrono::Duration::days(7),
        );
        let sessions = SessionManager::new(store.clone(), store.clone(), codec);
        let throttle = Arc::new(LastSeenThrottle::default());
        let service = AuthService::new(
            store.clone(),
            store.clone(),
            sessions,
            Arc::new(Argon2Hasher::new()),
            audit.clone(),
            throttle.clone(),
        );
        Fixture {
            store,
            audit,
            throttle,
            service,
        }
    }

    fn seed_user(f: &Fixture, username: &str, password: &str, active: bool) -> Uuid {
        let hash = Argon2Hasher::new().hash(password).unwrap();
        f.store.seed_user(username, &hash, active)
    }

    fn context_of(outcome: &LoginOutcome) -> AuthContext {
        AuthContext {
            user_id: outcome.user.id,
            session_id: outcome.session.id,
        }
    }

    #[tokio::test]
    async fn test_login_returns_profile_and_tokens() {
        let f = fixture();
        let user = seed_user(&f, "dokter", "rahasia-123", true);
        f.store.seed_role_with_permissions(user, "dokter", &["rawat_jalan.read", "emr.read"]);

        let outcome = f
            .service
            .login("dokter", "rahasia-123", Some("firefox".into()), Some("10.0.0.1".into()))
            .await
            .unwrap();

        assert_eq!(outcome.user.id, user);
        assert_eq!(outcome.user.permissions, vec!["emr.read", "rawat_jalan.read"]);
        assert_eq!(outcome.user.roles[0].name, "dokter");
        assert!(outcome.user.last_login_at.is_some());
        assert_eq!(outcome.tokens.token_type, "Bearer");
    }

    #[tokio::test]
    async fn test_login_failures_do_not_leak_user_existence() {
        let f = fixture();
        seed_user(&f, "dokter", "rahasia-123", true);

        let unknown = f.service.login("tidak-ada", "x", None, None).await.unwrap_err();
        let wrong = f.service.login("dokter", "salah", None, None).await.unwrap_err();

        assert_eq!(unknown.code(), "INVALID_CREDENTIALS");
        assert_eq!(wrong.code(), "INVALID_CREDENTIALS");
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_inactive_user_rejected_after_password_check() {
        let f = fixture();
        seed_user(&f, "mantan", "rahasia-123", false);

        assert!(matches!(
            f.service.login("mantan", "rahasia-123", None, None).await,
            Err(AuthError::UserInactive)
        ));
        assert!(matches!(
            f.service.login("mantan", "salah", None, None).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_and_audits() {
        let f = fixture();
        seed_user(&f, "dokter", "rahasia-123", true);
        let outcome = f.service.login("dokter", "rahasia-123", None, None).await.unwrap();
        let ctx = context_of(&outcome);
        assert!(f.throttle.should_touch(ctx.session_id).await);

        f.service.logout(&ctx, Some("10.0.0.1".into())).await.unwrap();

        let session = f.service.sessions().get_session(ctx.session_id).await.unwrap().unwrap();
        assert!(!session.is_active());
        // 갱신 기록이 지워져 간격 안에서도 다시 true
        assert!(f.throttle.should_touch(ctx.session_id).await);

        let events = f.audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].table, "login_sessions");
        assert_eq!(events[0].actor_id, Some(ctx.user_id));
    }

    #[tokio::test]
    async fn test_list_sessions_marks_current() {
        let f = fixture();
        seed_user(&f, "dokter", "rahasia-123", true);
        let first = f.service.login("dokter", "rahasia-123", None, None).await.unwrap();
        let second = f.service.login("dokter", "rahasia-123", None, None).await.unwrap();
        f.service.logout(&context_of(&first), None).await.unwrap();

        let ctx = context_of(&second);
        let all = f.service.list_sessions(&ctx, false).await.unwrap();
        let active = f.service.list_sessions(&ctx, true).await.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(active.len(), 1);
        assert!(active[0].is_current);
        assert!(all.iter().any(|s| !s.is_active && s.revoked_at.is_some()));
    }

    #[tokio::test]
    async fn test_foreign_session_revoke_requires_permission() {
        let f = fixture();
        seed_user(&f, "perawat", "rahasia-123", true);
        let admin = seed_user(&f, "admin", "rahasia-123", true);

        let victim = f.service.login("perawat", "rahasia-123", None, None).await.unwrap();
        let actor = f.service.login("admin", "rahasia-123", None, None).await.unwrap();
        let actor_ctx = context_of(&actor);

        let mut cache = PermissionCache::new();
        assert!(matches!(
            f.service
                .revoke_session(&mut cache, &actor_ctx, victim.session.id, None)
                .await,
            Err(AuthError::SessionNotFound)
        ));

        f.store.seed_override(admin, SESSION_REVOKE_PERMISSION, OverrideEffect::Grant);
        let mut cache = PermissionCache::new();
        f.service
            .revoke_session(&mut cache, &actor_ctx, victim.session.id, None)
            .await
            .unwrap();
        assert_eq!(cache.get(SESSION_REVOKE_PERMISSION), Some(true));
    }

    #[tokio::test]
    async fn test_own_session_revoke_skips_permission_lookup() {
        let f = fixture();
        seed_user(&f, "dokter", "rahasia-123", true);
        let first = f.service.login("dokter", "rahasia-123", None, None).await.unwrap();
        let second = f.service.login("dokter", "rahasia-123", None, None).await.unwrap();

        assert!(f.throttle.should_touch(first.session.id).await);
        let queries = f.store.permission_queries();
        let mut cache = PermissionCache::new();
        f.service
            .revoke_session(&mut cache, &context_of(&second), first.session.id, None)
            .await
            .unwrap();

        assert_eq!(f.store.permission_queries(), queries);
        assert!(cache.contents().is_empty());
        assert!(f.throttle.should_touch(first.session.id).await);
    }

    #[tokio::test]
    async fn test_override_upsert_and_removal_are_audited() {
        let f = fixture();
        let admin = seed_user(&f, "admin", "rahasia-123", true);
        let target = seed_user(&f, "casemix", "rahasia-123", true);
        f.store.seed_permission("vedika.read");
        let ctx = AuthContext {
            user_id: admin,
            session_id: Uuid::new_v4(),
        };

        let first = f
            .service
            .set_override(&ctx, target, "vedika.read", OverrideEffect::Grant, None)
            .await
            .unwrap();
        assert_eq!(first.previous, None);

        let second = f
            .service
            .set_override(&ctx, target, "vedika.read", OverrideEffect::Revoke, None)
            .await
            .unwrap();
        assert_eq!(second.previous, Some(OverrideEffect::Grant));

        let removed = f
            .service
            .remove_override(&ctx, target, "vedika.read", None)
            .await
            .unwrap();
        assert_eq!(removed.previous, Some(OverrideEffect::Revoke));

        let actions: Vec<AuditAction> = f.audit.events().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::Update, AuditAction::Update, AuditAction::Delete]
        );
    }

    #[tokio::test]
    async fn test_override_unknown_targets() {
        let f = fixture();
        let admin = seed_user(&f, "admin", "rahasia-123", true);
        let ctx = AuthContext {
            user_id: admin,
            session_id: Uuid::new_v4(),
        };

        assert!(matches!(
            f.service
                .set_override(&ctx, Uuid::new_v4(), "vedika.read", OverrideEffect::Grant, None)
                .await,
            Err(AuthError::UserNotFound)
        ));
        assert!(matches!(
            f.service
                .set_override(&ctx, admin, "tidak.ada", OverrideEffect::Grant, None)
                .await,
            Err(AuthError::PermissionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_override_rejects_malformed_code_before_lookup() {
        let f = fixture();
        let admin = seed_user(&f, "admin", "rahasia-123", true);
        let ctx = AuthContext {
            user_id: admin,
            session_id: Uuid::new_v4(),
        };
        // 조회가 일어나면 내부 에러가 되므로 형식 검사가 먼저임을 확인
        f.store.fail_permission_queries(true);

        for code in ["vedika", "Vedika.Read", "vedika..read", ".read"] {
            let err = f
                .service
                .set_override(&ctx, admin, code, OverrideEffect::Grant, None)
                .await
                .unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR", "{code}");

            let err = f
                .service
                .remove_override(&ctx, Uuid::new_v4(), code, None)
                .await
                .unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR", "{code}");
        }
        assert!(f.audit.events().is_empty());
    }

    #[tokio::test]
    async fn test_revoke_all_for_user_counts() {
        let f = fixture();
        let user = seed_user(&f, "dokter", "rahasia-123", true);
        let mut sessions = Vec::new();
        for _ in 0..2 {
            let outcome = f.service.login("dokter", "rahasia-123", None, None).await.unwrap();
            assert!(f.throttle.should_touch(outcome.session.id).await);
            sessions.push(outcome.session.id);
        }
        let ctx = AuthContext {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
        };

        assert_eq!(f.service.revoke_all_for_user(&ctx, user, None).await.unwrap(), 2);
        for id in sessions {
            assert!(f.throttle.should_touch(id).await);
        }
        assert_eq!(f.service.revoke_all_for_user(&ctx, user, None).await.unwrap(), 0);
        assert!(matches!(
            f.service.revoke_all_for_user(&ctx, Uuid::new_v4(), None).await,
            Err(AuthError::UserNotFound)
        ));
    }
}
