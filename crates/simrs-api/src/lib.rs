//! SIMRS 인증/인가 REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API (로그인, 토큰 교체, 세션, 권한 오버라이드)
//! - JWT 인증 가드와 요청 단위 권한 캐시
//! - 로그인 시도 제한 (인메모리 또는 Redis 카운터)
//! - 감사 로그 싱크
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 토큰, 세션, 권한 해석, 인증 가드
//! - [`repository`]: PostgreSQL 및 인메모리 저장소
//! - [`audit`]: 감사 로그 싱크
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod audit;
pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod state;

pub use auth::{AuthError, AuthService, Claims, TokenCodec, TokenPair};
pub use error::{ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use routes::{create_api_router, create_app};
pub use state::{AppComponents, AppState, AuthSettings};
