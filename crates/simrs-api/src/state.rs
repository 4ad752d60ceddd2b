//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 모든 API 핸들러에서 공유되는 상태를 관리합니다.
//! 내부 구성 요소는 모두 `Arc` 기반이라 복제 비용이 낮습니다.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use simrs_core::{AppConfig, AuditSink, CredentialHasher, PermissionStore, SessionStore, UserStore};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::{
    AuthGuard, AuthService, LastSeenThrottle, LivenessConfig, LivenessDispatcher,
    PermissionGate, PermissionResolver, SessionManager, TokenCodec,
};
use crate::middleware::{ClientAddrPolicy, LoginRateLimiter, RateLimitStore};
use crate::repository::{MemoryStore, PermissionRepository, SessionRepository, UserRepository};
use crate::routes::health::ReadinessProbe;

/// 상태 구성에 필요한 협력자.
#[derive(Clone)]
pub struct AppComponents {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub audit: Arc<dyn AuditSink>,
    pub rate_limit_store: Arc<dyn RateLimitStore>,
}

impl AppComponents {
    /// PostgreSQL 저장소로 구성합니다.
    pub fn postgres(
        pool: PgPool,
        hasher: Arc<dyn CredentialHasher>,
        audit: Arc<dyn AuditSink>,
        rate_limit_store: Arc<dyn RateLimitStore>,
    ) -> Self {
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            sessions: Arc::new(SessionRepository::new(pool.clone())),
            permissions: Arc::new(PermissionRepository::new(pool)),
            hasher,
            audit,
            rate_limit_store,
        }
    }

    /// 하나의 인메모리 저장소로 구성합니다.
    pub fn in_memory(
        store: Arc<MemoryStore>,
        hasher: Arc<dyn CredentialHasher>,
        audit: Arc<dyn AuditSink>,
        rate_limit_store: Arc<dyn RateLimitStore>,
    ) -> Self {
        Self {
            users: store.clone(),
            sessions: store.clone(),
            permissions: store,
            hasher,
            audit,
            rate_limit_store,
        }
    }
}

/// 인증 관련 조정값.
#[derive(Clone)]
pub struct AuthSettings {
    pub codec: TokenCodec,
    pub max_login_attempts: u32,
    pub login_window: Duration,
    pub last_seen_interval: Duration,
    pub liveness: LivenessConfig,
    /// 프록시 헤더를 클라이언트 주소로 신뢰할지 여부
    pub trust_forwarded_headers: bool,
}

impl AuthSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            codec: TokenCodec::from_config(&config.jwt),
            max_login_attempts: config.login_rate_limit.max_attempts,
            login_window: config.login_rate_limit.window(),
            last_seen_interval: config.session.last_seen_interval(),
            liveness: LivenessConfig::from_settings(&config.session),
            trust_forwarded_headers: config.server.trust_forwarded_headers,
        }
    }
}

/// 애플리케이션 공유 상태.
///
/// Axum의 State extractor를 통해 핸들러에 주입됩니다.
#[derive(Clone)]
pub struct AppState {
    /// 로그인/로그아웃/세션/오버라이드 유스케이스
    pub auth: AuthService,

    /// 인증 가드 상태
    pub guard: AuthGuard,

    /// 로그인 시도 제한기
    pub login_limiter: LoginRateLimiter,

    /// 감사 로그/세션에 기록할 클라이언트 주소 결정 정책
    pub client_addr: ClientAddrPolicy,

    /// 준비 상태 확인 대상 (DB, 카운터 저장소)
    pub probes: Vec<Arc<dyn ReadinessProbe>>,

    /// Prometheus 렌더링 핸들 (`/metrics`)
    pub metrics: Option<PrometheusHandle>,

    /// API 버전
    pub version: String,

    /// 서버 시작 시간
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// 상태를 구성하고 세션 활동 갱신 워커를 시작합니다.
    ///
    /// 반환된 핸들은 `shutdown` 취소 후 종료됩니다.
    pub fn build(
        components: AppComponents,
        settings: AuthSettings,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let sessions = SessionManager::new(
            components.sessions.clone(),
            components.users.clone(),
            settings.codec,
        );
        let (liveness, worker) =
            LivenessDispatcher::spawn(sessions.clone(), settings.liveness, shutdown);

        let throttle = Arc::new(LastSeenThrottle::new(settings.last_seen_interval));
        let guard = AuthGuard::new(sessions.clone(), throttle.clone(), liveness);

        let auth = AuthService::new(
            components.users,
            components.permissions,
            sessions,
            components.hasher,
            components.audit,
            throttle,
        );

        let client_addr = ClientAddrPolicy::new(settings.trust_forwarded_headers);
        let login_limiter = LoginRateLimiter::new(
            components.rate_limit_store,
            settings.max_login_attempts,
            settings.login_window,
        )
        .with_client_addr_policy(client_addr);

        let state = Self {
            auth,
            guard,
            login_limiter,
            client_addr,
            probes: Vec::new(),
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        };
        (state, worker)
    }

    /// 준비 상태 확인 대상을 추가합니다.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn resolver(&self) -> PermissionResolver {
        self.auth.resolver().clone()
    }

    /// 단일 권한을 요구하는 인가 가드 상태.
    pub fn require(&self, code: &'static str) -> PermissionGate {
        PermissionGate::require(self.resolver(), code)
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

impl FromRef<Arc<AppState>> for ClientAddrPolicy {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.client_addr
    }
}
