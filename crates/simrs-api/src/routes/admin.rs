//! 관리자 endpoint.
//!
//! - `POST /admin/users/{id}/sessions/revoke` - 사용자 전체 세션 폐기 (`session.revoke`)
//! - `PUT /admin/users/{id}/permissions/{code}` - 권한 오버라이드 설정 (`permission.manage`)
//! - `DELETE /admin/users/{id}/permissions/{code}` - 권한 오버라이드 제거 (`permission.manage`)

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    middleware,
    routing::{post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use simrs_core::OverrideEffect;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    authenticate, permission_gate, Authenticated, OverrideChange, PERMISSION_MANAGE_PERMISSION,
    SESSION_REVOKE_PERMISSION,
};
use crate::error::{ApiErrorResponse, ApiResult, ValidatedJson};
use crate::middleware::ClientInfo;
use crate::state::AppState;

/// 오버라이드 설정 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OverrideRequest {
    /// `GRANT` 또는 `REVOKE`
    pub effect: OverrideEffect,
}

/// 전체 세션 폐기 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct RevokeAllResponse {
    pub user_id: Uuid,
    /// 폐기된 세션 수
    pub revoked: u64,
}

/// 사용자의 모든 활성 세션 폐기.
#[utoipa::path(
    post,
    path = "/admin/users/{id}/sessions/revoke",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "사용자 ID")),
    responses(
        (status = 200, description = "폐기 완료", body = RevokeAllResponse),
        (status = 403, description = "권한 없음", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    )
)]
pub async fn revoke_user_sessions(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    client: ClientInfo,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<RevokeAllResponse>> {
    let revoked = state
        .auth
        .revoke_all_for_user(&auth.context, user_id, client.addr)
        .await?;
    Ok(Json(RevokeAllResponse { user_id, revoked }))
}

/// 사용자 권한 오버라이드 설정.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/permissions/{code}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "사용자 ID"),
        ("code" = String, Path, description = "권한 코드 (예: vedika.read)")
    ),
    request_body = OverrideRequest,
    responses(
        (status = 200, description = "설정 완료", body = OverrideChange),
        (status = 400, description = "잘못된 권한 코드 또는 효과", body = ApiErrorResponse),
        (status = 403, description = "권한 없음", body = ApiErrorResponse),
        (status = 404, description = "사용자 또는 권한 없음", body = ApiErrorResponse)
    )
)]
pub async fn set_override(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    client: ClientInfo,
    Path((user_id, code)): Path<(Uuid, String)>,
    ValidatedJson(request): ValidatedJson<OverrideRequest>,
) -> ApiResult<Json<OverrideChange>> {
    let change = state
        .auth
        .set_override(&auth.context, user_id, &code, request.effect, client.addr)
        .await?;
    Ok(Json(change))
}

/// 사용자 권한 오버라이드 제거.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}/permissions/{code}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "사용자 ID"),
        ("code" = String, Path, description = "권한 코드")
    ),
    responses(
        (status = 200, description = "제거 완료 (없었으면 previous = null)", body = OverrideChange),
        (status = 400, description = "잘못된 권한 코드", body = ApiErrorResponse),
        (status = 403, description = "권한 없음", body = ApiErrorResponse),
        (status = 404, description = "사용자 또는 권한 없음", body = ApiErrorResponse)
    )
)]
pub async fn remove_override(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    client: ClientInfo,
    Path((user_id, code)): Path<(Uuid, String)>,
) -> ApiResult<Json<OverrideChange>> {
    let change = state
        .auth
        .remove_override(&auth.context, user_id, &code, client.addr)
        .await?;
    Ok(Json(change))
}

/// 관리자 라우터 생성.
pub fn admin_router(state: &AppState) -> Router<Arc<AppState>> {
    let sessions = Router::new()
        .route("/users/{id}/sessions/revoke", post(revoke_user_sessions))
        .route_layer(middleware::from_fn_with_state(
            state.require(SESSION_REVOKE_PERMISSION),
            permission_gate,
        ));

    let permissions = Router::new()
        .route(
            "/users/{id}/permissions/{code}",
            put(set_override).delete(remove_override),
        )
        .route_layer(middleware::from_fn_with_state(
            state.require(PERMISSION_MANAGE_PERMISSION),
            permission_gate,
        ));

    sessions
        .merge(permissions)
        .route_layer(middleware::from_fn_with_state(state.guard.clone(), authenticate))
}
