//! 인증 endpoint.
//!
//! - `POST /auth/login` - 로그인 (시도 제한 적용)
//! - `POST /auth/refresh` - 리프레시 토큰 교체
//! - `POST /auth/logout` - 현재 세션 폐기
//! - `GET /auth/me` - 현재 사용자 프로필
//! - `GET /auth/sessions` - 내 세션 목록
//! - `POST /auth/sessions/{id}/revoke` - 세션 폐기

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{authenticate, Authenticated, LoginOutcome, SessionView, TokenPair, UserProfile};
use crate::error::{ApiErrorResponse, ApiResult, ValidatedJson};
use crate::middleware::{login_rate_limit, ClientInfo};
use crate::state::AppState;

// ==================== 요청/응답 ====================

/// 로그인 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// 로그인 이름
    #[validate(length(min = 1, max = 100, message = "사용자 이름은 1-100자여야 합니다"))]
    pub username: String,
    /// 비밀번호
    #[validate(length(min = 1, max = 1024, message = "비밀번호는 1-1024자여야 합니다"))]
    pub password: String,
    /// 기기 설명 (없으면 User-Agent 사용)
    #[serde(default)]
    #[validate(length(max = 255, message = "기기 설명은 255자 이하여야 합니다"))]
    pub device_info: Option<String>,
}

/// 토큰 교체 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "리프레시 토큰이 필요합니다"))]
    pub refresh_token: String,
}

/// 세션 목록 쿼리.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SessionsQuery {
    /// `true`면 활성 세션만
    #[serde(default)]
    pub active: Option<bool>,
}

/// 세션 목록 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionView>,
    pub total: usize,
}

// ==================== 핸들러 ====================

/// 로그인.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "로그인 성공", body = LoginOutcome),
        (status = 400, description = "잘못된 요청", body = ApiErrorResponse),
        (status = 401, description = "자격 증명 오류 또는 비활성 사용자", body = ApiErrorResponse),
        (status = 429, description = "로그인 시도 초과", body = ApiErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<LoginOutcome>> {
    let device = request.device_info.or(client.device);
    let outcome = state
        .auth
        .login(&request.username, &request.password, device, client.addr)
        .await?;
    Ok(Json(outcome))
}

/// 리프레시 토큰으로 새 토큰 쌍 발급.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "토큰 재발급 성공", body = TokenPair),
        (status = 401, description = "유효하지 않거나 이미 사용된 리프레시 토큰", body = ApiErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    Ok(Json(state.auth.refresh(&request.refresh_token).await?))
}

/// 현재 세션 로그아웃.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "로그아웃 완료"),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    client: ClientInfo,
) -> ApiResult<StatusCode> {
    state.auth.logout(&auth.context, client.addr).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 현재 사용자 프로필 (역할, 유효 권한 포함).
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "프로필", body = UserProfile),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    )
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    mut auth: Authenticated,
) -> ApiResult<Json<UserProfile>> {
    let profile = state.auth.profile(&mut auth.cache, &auth.context).await?;
    Ok(Json(profile))
}

/// 내 세션 목록.
#[utoipa::path(
    get,
    path = "/auth/sessions",
    tag = "auth",
    security(("bearer_auth" = [])),
    params(SessionsQuery),
    responses(
        (status = 200, description = "세션 목록 (최근 활동 순)", body = SessionsResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    )
)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Query(query): Query<SessionsQuery>,
) -> ApiResult<Json<SessionsResponse>> {
    let sessions = state
        .auth
        .list_sessions(&auth.context, query.active.unwrap_or(false))
        .await?;
    Ok(Json(SessionsResponse {
        total: sessions.len(),
        sessions,
    }))
}

/// 세션 폐기.
///
/// 다른 사용자의 세션은 `session.revoke` 권한이 있어야 폐기할 수 있습니다.
#[utoipa::path(
    post,
    path = "/auth/sessions/{id}/revoke",
    tag = "auth",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "세션 ID")),
    responses(
        (status = 204, description = "폐기 완료"),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 404, description = "없거나 이미 폐기된 세션", body = ApiErrorResponse)
    )
)]
pub async fn revoke_session(
    State(state): State<Arc<AppState>>,
    mut auth: Authenticated,
    client: ClientInfo,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .auth
        .revoke_session(&mut auth.cache, &auth.context, session_id, client.addr)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 인증 라우터 생성.
pub fn auth_router(state: &AppState) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route(
            "/login",
            post(login).route_layer(middleware::from_fn_with_state(
                state.login_limiter.clone(),
                login_rate_limit,
            )),
        )
        .route("/refresh", post(refresh));

    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}/revoke", post(revoke_session))
        .route_layer(middleware::from_fn_with_state(state.guard.clone(), authenticate));

    public.merge(protected)
}
