//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/auth` - 로그인, 토큰 교체, 로그아웃, 프로필, 세션
//! - `/admin` - 세션 일괄 폐기, 권한 오버라이드 (권한 필요)
//! - `/metrics` - Prometheus 메트릭

pub mod admin;
pub mod auth;
pub mod health;

pub use admin::{admin_router, OverrideRequest, RevokeAllResponse};
pub use auth::{auth_router, LoginRequest, RefreshRequest, SessionsQuery, SessionsResponse};
pub use health::{
    health_router, ComponentStatus, DatabaseProbe, HealthResponse, RateLimitStoreProbe,
    ReadinessProbe,
};

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::middleware::metrics_layer;
use crate::openapi::swagger_ui_router;
use crate::state::AppState;

/// 전체 API 라우터 생성.
///
/// 인증/인가 레이어는 각 서브 라우터가 자신의 라우트에만 적용합니다.
pub fn create_api_router(state: &AppState) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/auth", auth_router(state))
        .nest("/admin", admin_router(state))
        .route("/metrics", get(health::metrics_handler))
}

/// 상태가 주입된 애플리케이션 라우터.
///
/// Swagger UI와 HTTP 메트릭 미들웨어를 포함합니다. 타임아웃, CORS,
/// 요청 추적 레이어는 바이너리에서 덧붙입니다.
pub fn create_app(state: Arc<AppState>) -> Router {
    create_api_router(&state)
        .with_state(state)
        .merge(swagger_ui_router())
        .layer(middleware::from_fn(metrics_layer))
}
