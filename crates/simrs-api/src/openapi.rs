//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::Router;
use simrs_core::{OverrideEffect, Role};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{LoginOutcome, OverrideChange, SessionBrief, SessionView, TokenPair, UserProfile};
use crate::error::ApiErrorResponse;
use crate::routes::{
    ComponentStatus, HealthResponse, LoginRequest, OverrideRequest, RefreshRequest,
    RevokeAllResponse, SessionsResponse,
};

// ==================== OpenAPI 문서 정의 ====================

/// SIMRS 인증 API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "SIMRS Auth API",
        description = r#"
# SIMRS 인증/인가 REST API

로그인 세션, 토큰 교체, 역할 기반 권한과 사용자별 권한 오버라이드를 제공합니다.

## 인증

`/auth/login`과 `/auth/refresh`를 제외한 엔드포인트는 JWT Bearer 토큰이 필요합니다.
`Authorization: Bearer <token>` 헤더를 포함하세요.

## 오류 응답

모든 오류는 `{ "code", "message", "timestamp" }` 형식이며 `code`는 안정적인 식별자입니다
(`INVALID_CREDENTIALS`, `SESSION_REVOKED`, `RATE_LIMIT_EXCEEDED` 등).
"#
    ),
    servers(
        (url = "http://localhost:8080", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 로그인, 토큰, 세션"),
        (name = "admin", description = "관리 - 세션 일괄 폐기, 권한 오버라이드")
    ),
    modifiers(&BearerAuth),
    // ==================== 스키마 등록 ====================
    components(
        schemas(
            // ===== Health =====
            HealthResponse,
            ComponentStatus,

            // ===== Common =====
            ApiErrorResponse,
            Role,
            OverrideEffect,

            // ===== Auth =====
            LoginRequest,
            RefreshRequest,
            LoginOutcome,
            TokenPair,
            UserProfile,
            SessionBrief,
            SessionView,
            SessionsResponse,

            // ===== Admin =====
            OverrideRequest,
            OverrideChange,
            RevokeAllResponse,
        )
    ),
    // ==================== 경로 등록 ====================
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::login,
        crate::routes::auth::refresh,
        crate::routes::auth::logout,
        crate::routes::auth::me,
        crate::routes::auth::list_sessions,
        crate::routes::auth::revoke_session,

        // ===== Admin =====
        crate::routes::admin::revoke_user_sessions,
        crate::routes::admin::set_override,
        crate::routes::admin::remove_override,
    )
)]
pub struct ApiDoc;

/// `bearer_auth` 보안 스키마 등록.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

// ==================== Swagger UI 라우터 ====================

/// Swagger UI 라우터 생성.
///
/// 다음 경로에 문서 UI를 마운트합니다:
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

// ==================== 테스트 ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_valid() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&spec).unwrap();

        assert!(json.contains("SIMRS Auth API"));

        // 태그 확인
        assert!(json.contains("health"));
        assert!(json.contains("auth"));
        assert!(json.contains("admin"));

        // 경로 확인
        assert!(json.contains("/health/ready"));
        assert!(json.contains("/auth/login"));
        assert!(json.contains("/auth/sessions/{id}/revoke"));
        assert!(json.contains("/admin/users/{id}/permissions/{code}"));
    }

    #[test]
    fn test_swagger_ui_router_creates() {
        let _router: Router<()> = swagger_ui_router();
    }

    #[test]
    fn test_openapi_contains_schemas_and_security() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string(&spec).unwrap();

        assert!(json.contains("LoginOutcome"));
        assert!(json.contains("OverrideChange"));
        assert!(json.contains("ApiErrorResponse"));
        assert!(json.contains("bearer_auth"));
    }
}
