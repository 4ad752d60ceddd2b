//! 유효 권한 계산 및 요청 단위 캐시.
//!
//! 권한 확인은 최소 두 번의 쿼리(역할 권한, 사용자 오버라이드)가 필요하고,
//! 한 요청에서 여러 번 호출될 수 있습니다. [`PermissionCache`]는 요청마다 새로 만들어
//! 서로 다른 코드당 한 번만 계산하도록 합니다. 캐시는 결과를 바꾸지 않고 기억만 합니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use simrs_core::{apply_overrides, OverrideEffect, PermissionStore, StoreResult};
use uuid::Uuid;

use crate::metrics::record_permission_check;

/// 요청 수명 동안만 유지되는 권한 판정 캐시.
///
/// 권한 코드별 판정과 "전체 집합 로드됨" 플래그를 가집니다.
/// 전체 집합이 로드된 뒤에는 맵에 없는 코드는 `false`입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionCache {
    verdicts: HashMap<String, bool>,
    full_loaded: bool,
}

impl PermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 캐시된 판정.
    pub fn get(&self, code: &str) -> Option<bool> {
        match self.verdicts.get(code) {
            Some(v) => Some(*v),
            None if self.full_loaded => Some(false),
            None => None,
        }
    }

    /// 판정을 기록합니다.
    pub fn insert(&mut self, code: impl Into<String>, granted: bool) {
        self.verdicts.insert(code.into(), granted);
    }

    /// 여러 판정을 미리 채웁니다.
    pub fn seed<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        for (code, granted) in entries {
            self.insert(code, granted);
        }
    }

    /// 전체 유효 권한 집합을 흡수합니다.
    pub fn absorb_full_set(&mut self, effective: &HashSet<String>) {
        for code in effective {
            self.verdicts.insert(code.clone(), true);
        }
        self.full_loaded = true;
    }

    pub fn is_full_loaded(&self) -> bool {
        self.full_loaded
    }

    /// 캐시 내용 (테스트 및 진단용).
    pub fn contents(&self) -> &HashMap<String, bool> {
        &self.verdicts
    }

    /// 허용으로 판정된 코드.
    pub fn granted_codes(&self) -> HashSet<String> {
        self.verdicts
            .iter()
            .filter(|(_, granted)| **granted)
            .map(|(code, _)| code.clone())
            .collect()
    }
}

/// 역할 권한과 사용자 오버라이드로부터 유효 권한을 계산합니다.
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn PermissionStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    /// 사용자의 유효 권한 집합을 처음부터 계산합니다.
    pub async fn effective_permissions(&self, user_id: Uuid) -> StoreResult<HashSet<String>> {
        let role_codes = self.store.role_permission_codes(user_id).await?;
        let overrides = self.store.user_overrides(user_id).await?;
        Ok(apply_overrides(
            role_codes,
            overrides.into_iter().map(|o| (o.code, o.effect)),
        ))
    }

    /// 캐시를 통해 유효 권한 집합을 반환합니다. 한 요청에서 한 번만 로드합니다.
    pub async fn effective_permissions_cached(
        &self,
        cache: &mut PermissionCache,
        user_id: Uuid,
    ) -> StoreResult<HashSet<String>> {
        if !cache.is_full_loaded() {
            let effective = self.effective_permissions(user_id).await?;
            cache.absorb_full_set(&effective);
        }
        Ok(cache.granted_codes())
    }

    /// 단일 권한 확인.
    ///
    /// 캐시에 판정이 있으면 그대로 반환하고, 없으면 코드 하나만 조회하여 캐시에 기록합니다.
    pub async fn has_permission(
        &self,
        cache: &mut PermissionCache,
        user_id: Uuid,
        code: &str,
    ) -> StoreResult<bool> {
        if let Some(granted) = cache.get(code) {
            record_permission_check("cached");
            return Ok(granted);
        }

        let granted = match self.resolve_one(user_id, code).await {
            Ok(granted) => granted,
            Err(e) => {
                record_permission_check("error");
                return Err(e);
            }
        };

        cache.insert(code, granted);
        record_permission_check(if granted { "granted" } else { "denied" });
        Ok(granted)
    }

    /// 하나라도 허용되면 `true`. 첫 허용에서 중단합니다.
    pub async fn has_any_permission(
        &self,
        cache: &mut PermissionCache,
        user_id: Uuid,
        codes: &[&str],
    ) -> StoreResult<bool> {
        for code in codes {
            if self.has_permission(cache, user_id, code).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn resolve_one(&self, user_id: Uuid, code: &str) -> StoreResult<bool> {
        match self.store.override_for(user_id, code).await? {
            Some(OverrideEffect::Grant) => Ok(true),
            Some(OverrideEffect::Revoke) => Ok(false),
            None => self.store.role_grants(user_id, code).await,
        }
    }
}
