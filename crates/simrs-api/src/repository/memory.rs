//! 인메모리 저장소.
//!
//! 단일 프로세스 개발 환경과 테스트에서 PostgreSQL 대신 사용합니다.
//! `UserStore`, `SessionStore`, `PermissionStore`를 하나의 구조체로 구현하며,
//! 잠금은 I/O 없이 메모리 조작에만 사용합니다.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use simrs_core::{
    LoginSession, OverrideEffect, Permission, PermissionStore, Role, SessionStore, StoreError,
    StoreResult, User, UserPermissionOverride, UserStore,
};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    user_roles: HashMap<Uuid, Vec<Uuid>>,
    permissions: HashMap<Uuid, Permission>,
    role_permissions: HashMap<Uuid, BTreeSet<Uuid>>,
    overrides: HashMap<(Uuid, Uuid), (OverrideEffect, DateTime<Utc>)>,
    sessions: HashMap<Uuid, LoginSession>,
}

impl Tables {
    fn permission_id(&self, code: &str) -> Option<Uuid> {
        self.permissions
            .values()
            .find(|p| p.code == code)
            .map(|p| p.id)
    }

    fn role_codes(&self, user_id: Uuid) -> BTreeSet<String> {
        self.user_roles
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|role_id| self.role_permissions.get(role_id))
            .flatten()
            .filter_map(|perm_id| self.permissions.get(perm_id))
            .map(|p| p.code.clone())
            .collect()
    }
}

/// 인메모리 저장소.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    permission_queries: AtomicUsize,
    last_seen_writes: AtomicUsize,
    fail_permissions: AtomicBool,
    fail_sessions: AtomicBool,
    last_seen_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_permissions(&self) -> StoreResult<()> {
        if self.fail_permissions.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("permission store offline".into()));
        }
        Ok(())
    }

    /// 권한 해석 쿼리의 공통 진입점. 성공한 쿼리마다 카운터를 한 번 올립니다.
    fn resolution_query(&self) -> StoreResult<()> {
        self.check_permissions()?;
        self.permission_queries.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn check_sessions(&self) -> StoreResult<()> {
        if self.fail_sessions.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("session store offline".into()));
        }
        Ok(())
    }

    // ==================== 시드 ====================

    /// 사용자를 추가하고 ID를 반환합니다.
    pub fn seed_user(&self, username: &str, password_hash: &str, active: bool) -> Uuid {
        let mut user = User::new(username, format!("{username}@simrs.local"), password_hash);
        user.is_active = active;
        let id = user.id;
        self.tables().users.insert(id, user);
        id
    }

    pub fn set_user_active(&self, user_id: Uuid, active: bool) {
        if let Some(user) = self.tables().users.get_mut(&user_id) {
            user.is_active = active;
        }
    }

    /// 권한 정의를 추가합니다. 이미 있으면 기존 ID를 반환합니다.
    pub fn seed_permission(&self, code: &str) -> Uuid {
        let mut tables = self.tables();
        if let Some(id) = tables.permission_id(code) {
            return id;
        }
        let permission = Permission::new(code);
        let id = permission.id;
        tables.permissions.insert(id, permission);
        id
    }

    /// 권한 묶음을 가진 역할을 만들고 사용자에게 할당합니다.
    pub fn seed_role_with_permissions(&self, user_id: Uuid, role_name: &str, codes: &[&str]) -> Uuid {
        let permission_ids: BTreeSet<Uuid> =
            codes.iter().map(|code| self.seed_permission(code)).collect();

        let role = Role::new(role_name);
        let role_id = role.id;

        let mut tables = self.tables();
        tables.roles.insert(role_id, role);
        tables.role_permissions.insert(role_id, permission_ids);
        tables.user_roles.entry(user_id).or_default().push(role_id);
        role_id
    }

    pub fn seed_override(&self, user_id: Uuid, code: &str, effect: OverrideEffect) {
        let permission_id = self.seed_permission(code);
        self.tables()
            .overrides
            .insert((user_id, permission_id), (effect, Utc::now()));
    }

    // ==================== 테스트 계측 ====================

    /// 권한 해석 쿼리 횟수.
    ///
    /// `role_permission_codes`, `user_overrides`, `override_for`, `role_grants` 호출마다 1.
    /// 전체 로드는 2, 단일 코드 조회는 오버라이드가 있으면 1, 없으면 2입니다.
    pub fn permission_queries(&self) -> usize {
        self.permission_queries.load(Ordering::SeqCst)
    }

    /// 완료된 `last_seen_at` 쓰기 횟수.
    pub fn last_seen_writes(&self) -> usize {
        self.last_seen_writes.load(Ordering::SeqCst)
    }

    pub fn fail_permission_queries(&self, fail: bool) {
        self.fail_permissions.store(fail, Ordering::Relaxed);
    }

    pub fn fail_session_queries(&self, fail: bool) {
        self.fail_sessions.store(fail, Ordering::Relaxed);
    }

    /// `last_seen_at` 쓰기를 지연시킵니다 (느린 저장소 시뮬레이션).
    pub fn set_last_seen_delay(&self, delay: Duration) {
        *self
            .last_seen_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(delay);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(user) = self.tables().users.get_mut(&id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn roles_of(&self, id: Uuid) -> StoreResult<Vec<Role>> {
        let tables = self.tables();
        let mut roles: Vec<Role> = tables
            .user_roles
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|role_id| tables.roles.get(role_id).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, session: &LoginSession) -> StoreResult<()> {
        self.check_sessions()?;
        self.tables().sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<LoginSession>> {
        self.check_sessions()?;
        Ok(self.tables().sessions.get(&id).cloned())
    }

    async fn find_by_refresh_hash(&self, hash: &str) -> StoreResult<Option<LoginSession>> {
        self.check_sessions()?;
        Ok(self
            .tables()
            .sessions
            .values()
            .find(|s| s.refresh_token_hash == hash)
            .cloned())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> StoreResult<Vec<LoginSession>> {
        self.check_sessions()?;
        let mut sessions: Vec<LoginSession> = self
            .tables()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && (!active_only || s.is_active()))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            b.last_seen_at
                .cmp(&a.last_seen_at)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(sessions)
    }

    async fn update_last_seen(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.check_sessions()?;
        let delay = *self
            .last_seen_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(session) = self.tables().sessions.get_mut(&id) {
            session.last_seen_at = at;
        }
        self.last_seen_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rotate_refresh_hash(
        &self,
        id: Uuid,
        expected: &str,
        new_hash: &str,
    ) -> StoreResult<bool> {
        self.check_sessions()?;
        let mut tables = self.tables();
        match tables.sessions.get_mut(&id) {
            Some(session) if session.is_active() && session.refresh_token_hash == expected => {
                session.refresh_token_hash = new_hash.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        self.check_sessions()?;
        let mut tables = self.tables();
        match tables.sessions.get_mut(&id) {
            Some(session) if session.is_active() => {
                session.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_by_user(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        self.check_sessions()?;
        let mut count = 0;
        for session in self.tables().sessions.values_mut() {
            if session.user_id == user_id && session.is_active() {
                session.revoked_at = Some(at);
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn role_permission_codes(&self, user_id: Uuid) -> StoreResult<Vec<String>> {
        self.resolution_query()?;
        Ok(self.tables().role_codes(user_id).into_iter().collect())
    }

    async fn user_overrides(&self, user_id: Uuid) -> StoreResult<Vec<UserPermissionOverride>> {
        self.resolution_query()?;
        let tables = self.tables();
        let mut overrides: Vec<UserPermissionOverride> = tables
            .overrides
            .iter()
            .filter(|((uid, _), _)| *uid == user_id)
            .filter_map(|((uid, pid), (effect, created_at))| {
                tables.permissions.get(pid).map(|p| UserPermissionOverride {
                    user_id: *uid,
                    permission_id: *pid,
                    code: p.code.clone(),
                    effect: *effect,
                    created_at: *created_at,
                })
            })
            .collect();
        overrides.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(overrides)
    }

    async fn role_grants(&self, user_id: Uuid, code: &str) -> StoreResult<bool> {
        self.resolution_query()?;
        Ok(self.tables().role_codes(user_id).contains(code))
    }

    async fn override_for(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> StoreResult<Option<OverrideEffect>> {
        self.resolution_query()?;
        let tables = self.tables();
        Ok(tables
            .permission_id(code)
            .and_then(|pid| tables.overrides.get(&(user_id, pid)))
            .map(|(effect, _)| *effect))
    }

    async fn find_permission_by_code(&self, code: &str) -> StoreResult<Option<Permission>> {
        self.check_permissions()?;
        Ok(self
            .tables()
            .permissions
            .values()
            .find(|p| p.code == code)
            .cloned())
    }

    async fn set_override(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        effect: OverrideEffect,
    ) -> StoreResult<Option<OverrideEffect>> {
        self.check_permissions()?;
        Ok(self
            .tables()
            .overrides
            .insert((user_id, permission_id), (effect, Utc::now()))
            .map(|(previous, _)| previous))
    }

    async fn remove_override(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
    ) -> StoreResult<Option<OverrideEffect>> {
        self.check_permissions()?;
        Ok(self
            .tables()
            .overrides
            .remove(&(user_id, permission_id))
            .map(|(previous, _)| previous))
    }
}
