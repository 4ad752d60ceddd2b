//! 인증 가드와 인가 가드.
//!
//! 요청 처리 순서:
//!
//! ```text
//! Authorization 헤더 → 토큰 검증 → 세션 확인 → (스로틀된 활동 갱신 예약)
//!   → AuthContext + 빈 PermissionCache를 요청 확장에 게시 → 인가 가드 → 핸들러
//! ```
//!
//! 권한 캐시는 요청 하나가 소유하므로 동기화가 필요 없습니다. 인가 가드는 확장에서 꺼내
//! 사용한 뒤 다시 넣고, 핸들러는 [`Authenticated`] 추출기로 소유권을 가져갑니다.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use simrs_core::auth_span;
use tracing::Instrument;
use uuid::Uuid;

use super::error::AuthError;
use super::liveness::LivenessDispatcher;
use super::permissions::{PermissionCache, PermissionResolver};
use super::session::SessionManager;
use super::throttle::LastSeenThrottle;

/// 인증된 요청의 신원.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub session_id: Uuid,
}

// ==================== 인증 가드 ====================

/// 인증 가드 상태.
#[derive(Clone)]
pub struct AuthGuard {
    sessions: SessionManager,
    throttle: Arc<LastSeenThrottle>,
    liveness: LivenessDispatcher,
}

impl AuthGuard {
    pub fn new(
        sessions: SessionManager,
        throttle: Arc<LastSeenThrottle>,
        liveness: LivenessDispatcher,
    ) -> Self {
        Self {
            sessions,
            throttle,
            liveness,
        }
    }

    /// 토큰과 세션을 확인하여 신원을 반환합니다.
    pub async fn identify(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let token = bearer_token(headers)?;
        let verified = self.sessions.codec().validate_access(token)?;

        // 없는 세션과 폐기된 세션은 구분하지 않음
        let session = self
            .sessions
            .get_session(verified.session_id)
            .await?
            .filter(|s| s.is_active() && s.user_id == verified.user_id)
            .ok_or(AuthError::SessionRevoked)?;

        if self.throttle.should_touch(session.id).await {
            self.liveness.schedule(session.id);
        }

        Ok(AuthContext {
            user_id: session.user_id,
            session_id: session.id,
        })
    }
}

/// `Authorization: Bearer <token>` 헤더에서 토큰을 추출합니다.
///
/// 스킴은 대소문자를 구분하지 않으며, 토큰은 비어 있지 않고 공백이 없어야 합니다.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::InvalidToken)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidToken)?;
    if !scheme.eq_ignore_ascii_case("bearer")
        || token.is_empty()
        || token.chars().any(char::is_whitespace)
    {
        return Err(AuthError::InvalidToken);
    }
    Ok(token)
}

/// 인증 미들웨어.
pub async fn authenticate(
    State(guard): State<AuthGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let context = guard.identify(request.headers()).await?;

    request.extensions_mut().insert(context);
    request.extensions_mut().insert(PermissionCache::new());

    let span = auth_span!("authenticated_request", context.user_id, context.session_id);
    Ok(next.run(request).instrument(span).await)
}

// ==================== 인가 가드 ====================

/// 인가 가드 상태. 나열된 코드 중 하나라도 허용되면 통과합니다.
#[derive(Clone)]
pub struct PermissionGate {
    resolver: PermissionResolver,
    codes: Arc<[&'static str]>,
}

impl PermissionGate {
    /// 단일 권한 요구.
    pub fn require(resolver: PermissionResolver, code: &'static str) -> Self {
        Self::require_any(resolver, &[code])
    }

    /// 여러 권한 중 하나 요구.
    pub fn require_any(resolver: PermissionResolver, codes: &[&'static str]) -> Self {
        Self {
            resolver,
            codes: codes.into(),
        }
    }
}

/// 인가 미들웨어.
///
/// 인증 가드가 먼저 실행되지 않았다면 `InvalidToken`. 거부 응답에는 어떤 권한이
/// 없었는지 포함하지 않습니다. 저장소 에러는 항상 거부(500)로 처리합니다.
pub async fn permission_gate(
    State(gate): State<PermissionGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let context = request
        .extensions()
        .get::<AuthContext>()
        .copied()
        .ok_or(AuthError::InvalidToken)?;

    let mut cache = request
        .extensions_mut()
        .remove::<PermissionCache>()
        .unwrap_or_default();

    let allowed = gate
        .resolver
        .has_any_permission(&mut cache, context.user_id, &gate.codes)
        .await
        .map_err(|e| AuthError::PermissionCheckFailed(e.to_string()))?;

    request.extensions_mut().insert(cache);

    if !allowed {
        tracing::warn!(
            user_id = %context.user_id,
            required = ?gate.codes,
            "Permission denied"
        );
        return Err(AuthError::Forbidden);
    }

    Ok(next.run(request).await)
}

// ==================== 추출기 ====================

/// 핸들러용 인증 정보 추출기.
///
/// 요청의 권한 캐시 소유권을 핸들러로 넘기므로, 핸들러 내부 권한 확인도
/// 가드가 이미 계산한 판정을 재사용합니다.
#[derive(Debug)]
pub struct Authenticated {
    pub context: AuthContext,
    pub cache: PermissionCache,
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AuthError::InvalidToken)?;
        let cache = parts
            .extensions
            .remove::<PermissionCache>()
            .unwrap_or_default();

        Ok(Self { context, cache })
    }
}
