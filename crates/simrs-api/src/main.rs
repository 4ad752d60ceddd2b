//! SIMRS 인증 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다.
//! 로그인/세션/권한 오버라이드와 헬스 체크, 메트릭 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, Router};
use simrs_core::{init_logging, AppConfig, LogConfig, RateLimitBackend};
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use simrs_api::audit::build_audit_sink;
use simrs_api::auth::Argon2Hasher;
use simrs_api::metrics::setup_metrics_recorder;
use simrs_api::middleware::{InMemoryRateLimitStore, RateLimitStore, RedisRateLimitStore};
use simrs_api::routes::{create_app, DatabaseProbe, RateLimitStoreProbe};
use simrs_api::state::{AppComponents, AppState, AuthSettings};

/// CORS 레이어 생성.
///
/// `server.cors_origins`가 비어 있으면 모든 origin을 허용합니다 (개발 모드).
fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<_> = origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let restricted = !parsed.is_empty();
    let allow_origin = if restricted {
        info!("CORS configured with {} allowed origins", parsed.len());
        AllowOrigin::list(parsed)
    } else {
        warn!("server.cors_origins not set, allowing any origin (development mode)");
        AllowOrigin::any()
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        // 자격 증명 포함은 origin이 제한된 경우에만
        .allow_credentials(restricted)
        .max_age(Duration::from_secs(3600))
}

/// 설정된 백엔드의 로그인 카운터 저장소 생성.
///
/// 인메모리 저장소는 만료 항목 정리 태스크를 함께 시작합니다.
async fn create_rate_limit_store(
    config: &AppConfig,
    shutdown: &CancellationToken,
) -> anyhow::Result<(Arc<dyn RateLimitStore>, Option<JoinHandle<()>>)> {
    let settings = &config.login_rate_limit;
    match settings.backend {
        RateLimitBackend::Memory => {
            let store = Arc::new(InMemoryRateLimitStore::new());
            let sweeper = store
                .clone()
                .spawn_cleanup(settings.cleanup_interval(), shutdown.clone());
            info!(backend = "memory", "Login rate limit store initialized");
            Ok((store, Some(sweeper)))
        }
        RateLimitBackend::Redis => {
            let url = settings
                .redis_url
                .as_deref()
                .context("login_rate_limit.redis_url이 설정되지 않았습니다")?;
            let store = RedisRateLimitStore::connect(url)
                .await
                .context("Redis 연결에 실패했습니다")?;
            info!(backend = "redis", "Login rate limit store initialized");
            Ok((Arc::new(store), None))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default().context("설정을 로드할 수 없습니다")?;

    init_logging(LogConfig::from_settings(&config.logging))
        .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {e}"))?;

    info!("Starting SIMRS auth API server...");

    let metrics_handle = setup_metrics_recorder().context("메트릭 레코더 설정 실패")?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = config
        .server
        .addr()
        .parse()
        .with_context(|| format!("소켓 주소가 유효하지 않습니다: {}", config.server.addr()))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await
        .context("데이터베이스 연결에 실패했습니다")?;
    info!(
        max_connections = config.database.max_connections,
        "Database pool initialized"
    );

    // 전역 종료 토큰 (백그라운드 태스크에 전파)
    let shutdown_token = CancellationToken::new();

    let (rate_limit_store, sweeper) = create_rate_limit_store(&config, &shutdown_token).await?;

    let components = AppComponents::postgres(
        pool.clone(),
        Arc::new(Argon2Hasher::new()),
        build_audit_sink(&config.audit),
        rate_limit_store.clone(),
    );

    let (state, liveness_worker) = AppState::build(
        components,
        AuthSettings::from_config(&config),
        shutdown_token.clone(),
    );
    let state = Arc::new(
        state
            .with_probe(Arc::new(DatabaseProbe::new(pool)))
            .with_probe(Arc::new(RateLimitStoreProbe::new(rate_limit_store)))
            .with_metrics(metrics_handle),
    );
    info!(version = %state.version, "Application state initialized");

    let app: Router = create_app(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.server.request_timeout_secs),
        ))
        .layer(cors_layer(&config.server.cors_origins));

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
    .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();

    // 백그라운드 태스크 정리에 최대 10초 대기
    let cleanup = tokio::time::timeout(Duration::from_secs(10), async {
        if let Err(e) = liveness_worker.await {
            warn!(error = %e, "Liveness worker terminated abnormally");
        }
        if let Some(sweeper) = sweeper {
            if let Err(e) = sweeper.await {
                warn!(error = %e, "Rate limit sweeper terminated abnormally");
            }
        }
    })
    .await;

    if cleanup.is_err() {
        warn!("Cleanup timeout, forcing shutdown");
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
