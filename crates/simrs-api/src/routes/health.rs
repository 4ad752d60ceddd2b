//! 헬스 체크 endpoint.
//!
//! 서버 상태 확인을 위한 헬스 체크 엔드포인트를 제공합니다.
//! 로드밸런서나 오케스트레이션 시스템(Kubernetes 등)에서 사용됩니다.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::middleware::RateLimitStore;
use crate::state::AppState;

/// 준비 상태 확인 대상.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// 응답에 표시될 컴포넌트 이름
    fn name(&self) -> &'static str;

    /// 정상이면 `Ok`, 아니면 사유.
    async fn check(&self) -> Result<(), String>;
}

/// PostgreSQL 연결 확인.
pub struct DatabaseProbe {
    pool: PgPool,
}

impl DatabaseProbe {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadinessProbe for DatabaseProbe {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn check(&self) -> Result<(), String> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// 로그인 카운터 저장소 확인.
pub struct RateLimitStoreProbe {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimitStoreProbe {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReadinessProbe for RateLimitStoreProbe {
    fn name(&self) -> &'static str {
        "rate_limit_store"
    }

    async fn check(&self) -> Result<(), String> {
        self.store.health_check().await.map_err(|e| e.to_string())
    }
}

/// 헬스 체크 응답 구조체.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// 전체 서비스 상태 ("healthy" | "unhealthy")
    pub status: String,

    /// API 버전
    pub version: String,

    /// 서버 업타임(초)
    pub uptime_secs: i64,

    /// 현재 시간 (ISO 8601)
    pub timestamp: String,

    /// 개별 컴포넌트 상태
    pub components: Vec<ComponentStatus>,
}

/// 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentStatus {
    pub name: String,

    /// 상태 ("up" | "down")
    pub status: String,

    /// 추가 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    /// 정상 상태.
    pub fn up(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: "up".to_string(),
            message: None,
        }
    }

    /// 비정상 상태.
    pub fn down(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: "down".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// 간단한 헬스 체크 (liveness probe용).
///
/// 서버가 응답 가능한 상태인지만 확인합니다.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "서버 동작 중", body = String))
)]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// 상세 헬스 체크 (readiness probe용).
///
/// 등록된 모든 의존성의 상태를 확인합니다. 하나라도 실패하면 503.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "모든 의존성 정상", body = HealthResponse),
        (status = 503, description = "일부 의존성 실패", body = HealthResponse)
    )
)]
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let checks = state.probes.iter().map(|probe| async move {
        match probe.check().await {
            Ok(()) => ComponentStatus::up(probe.name()),
            Err(e) => {
                tracing::warn!(component = probe.name(), error = %e, "Readiness check failed");
                ComponentStatus::down(probe.name(), "연결 실패")
            }
        }
    });
    let components = futures::future::join_all(checks).await;

    let healthy = components.iter().all(ComponentStatus::is_up);
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components,
    };

    (status_code, Json(response))
}

/// Prometheus 메트릭 노출.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}
