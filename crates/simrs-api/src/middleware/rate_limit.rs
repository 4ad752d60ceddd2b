//! 로그인 Rate limiting middleware.
//!
//! 사용자 이름 + 클라이언트 주소별 고정 윈도우 카운터입니다. 윈도우의 첫 시도에서
//! 시작 시각을 기록하고, 윈도우가 지나면 카운트가 1로 다시 시작합니다.
//!
//! 카운터 저장소는 [`RateLimitStore`]로 추상화되어 있어 단일 인스턴스에서는
//! [`InMemoryRateLimitStore`], 여러 인스턴스에서는 [`RedisRateLimitStore`]를 사용합니다.
//! 저장소 에러 시에는 로그인을 허용합니다 (fail open).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use redis::AsyncCommands;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::client::ClientAddrPolicy;
use crate::auth::AuthError;
use crate::metrics::record_rate_limit;

/// 빈 사용자 이름 대신 사용하는 키 조각.
pub const EMPTY_USERNAME_SENTINEL: &str = "_empty_";

const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// 로그인 요청 본문 최대 크기.
const MAX_LOGIN_BODY_BYTES: usize = 16 * 1024;

/// 카운터 저장소 에러.
#[derive(Debug, Error)]
pub enum RateLimitStoreError {
    #[error("Redis 에러: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("카운터 저장소 사용 불가: {0}")]
    Unavailable(String),
}

/// 증가 후 윈도우 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// 현재 윈도우의 시도 횟수 (이번 시도 포함)
    pub count: u64,
    /// 윈도우가 끝날 때까지 남은 시간
    pub resets_in: Duration,
}

/// 윈도우 카운터 저장소.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// 키의 카운트를 증가시킵니다. 윈도우가 없거나 지났으면 1부터 새로 시작합니다.
    async fn increment(&self, key: &str, window: Duration)
        -> Result<WindowCount, RateLimitStoreError>;

    /// 현재 윈도우의 카운트. 윈도우가 지났으면 0.
    async fn get_count(&self, key: &str) -> Result<u64, RateLimitStoreError>;

    /// 만료된 윈도우 정리. 제거된 수를 반환합니다.
    async fn cleanup(&self) -> Result<usize, RateLimitStoreError>;

    /// 저장소 연결 확인.
    async fn health_check(&self) -> Result<(), RateLimitStoreError> {
        Ok(())
    }
}

// ==================== 인메모리 저장소 ====================

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    expires_at: Instant,
}

/// 프로세스 로컬 카운터 저장소.
///
/// 증가와 정리 모두 같은 잠금을 사용합니다.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 추적 중인 키 수.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }

    /// 주기적 정리 태스크를 시작합니다. `shutdown`이 취소되면 종료합니다.
    ///
    /// 0 간격은 1초로 올려 잡습니다 (`tokio::time::interval`은 0에서 panic).
    pub fn spawn_cleanup(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_CLEANUP_INTERVAL));
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Ok(removed) = self.cleanup().await {
                            if removed > 0 {
                                tracing::debug!(removed, "Expired login windows cleaned up");
                            }
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn increment(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<WindowCount, RateLimitStoreError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            expires_at: now + window,
        });
        if now >= entry.expires_at {
            entry.count = 0;
            entry.expires_at = now + window;
        }
        entry.count += 1;

        Ok(WindowCount {
            count: entry.count,
            resets_in: entry.expires_at - now,
        })
    }

    async fn get_count(&self, key: &str) -> Result<u64, RateLimitStoreError> {
        let now = Instant::now();
        Ok(self
            .windows
            .lock()
            .await
            .get(key)
            .filter(|w| now < w.expires_at)
            .map_or(0, |w| w.count))
    }

    async fn cleanup(&self) -> Result<usize, RateLimitStoreError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| now < w.expires_at);
        Ok(before - windows.len())
    }
}

// ==================== Redis 저장소 ====================

/// Redis 카운터 저장소.
///
/// `INCR` 후 첫 증가에서 `PEXPIRE`로 윈도우를 설정합니다. 만료는 Redis가 처리하므로
/// 정리 작업이 필요 없습니다.
#[derive(Clone)]
pub struct RedisRateLimitStore {
    conn: redis::aio::ConnectionManager,
    prefix: String,
}

impl RedisRateLimitStore {
    /// Redis에 연결합니다.
    pub async fn connect(url: &str) -> Result<Self, RateLimitStoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            prefix: "simrs:ratelimit:".to_string(),
        })
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn increment(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<WindowCount, RateLimitStoreError> {
        let key = self.redis_key(key);
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        let mut conn = self.conn.clone();

        let count: u64 = conn.incr(&key, 1u64).await?;
        if count == 1 {
            let _: bool = conn.pexpire(&key, window_ms).await?;
        }

        let mut ttl_ms: i64 = conn.pttl(&key).await?;
        if ttl_ms < 0 {
            // INCR과 PEXPIRE 사이에 실패한 경우 만료가 없는 키가 남을 수 있음
            let _: bool = conn.pexpire(&key, window_ms).await?;
            ttl_ms = window_ms;
        }

        Ok(WindowCount {
            count,
            resets_in: Duration::from_millis(ttl_ms.max(0) as u64),
        })
    }

    async fn get_count(&self, key: &str) -> Result<u64, RateLimitStoreError> {
        let mut conn = self.conn.clone();
        let count: Option<u64> = conn.get(self.redis_key(key)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn cleanup(&self) -> Result<usize, RateLimitStoreError> {
        Ok(0)
    }

    async fn health_check(&self) -> Result<(), RateLimitStoreError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(RateLimitStoreError::Unavailable(pong))
        }
    }
}

// ==================== Limiter ====================

/// Rate Limit 확인 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// 시도 허용됨
    Allowed,
    /// 윈도우 내 최대 시도 초과
    Limited {
        /// 재시도까지 대기 시간 (초)
        retry_after_secs: u64,
    },
}

/// 로그인 시도 제한기.
#[derive(Clone)]
pub struct LoginRateLimiter {
    store: Arc<dyn RateLimitStore>,
    max_attempts: u64,
    window: Duration,
    client_addr: ClientAddrPolicy,
}

impl LoginRateLimiter {
    /// 프록시 헤더를 신뢰하지 않는 제한기를 생성합니다.
    pub fn new(store: Arc<dyn RateLimitStore>, max_attempts: u32, window: Duration) -> Self {
        Self {
            store,
            max_attempts: u64::from(max_attempts),
            window,
            client_addr: ClientAddrPolicy::default(),
        }
    }

    /// 카운터 키에 쓸 클라이언트 주소 결정 정책을 지정합니다.
    #[must_use]
    pub fn with_client_addr_policy(mut self, policy: ClientAddrPolicy) -> Self {
        self.client_addr = policy;
        self
    }

    /// 카운터 키: `login:<username>:<addr>`.
    pub fn key(username: &str, client_addr: &str) -> String {
        let username = if username.is_empty() {
            EMPTY_USERNAME_SENTINEL
        } else {
            username
        };
        format!("login:{}:{}", username, client_addr)
    }

    /// 시도를 기록하고 허용 여부를 판정합니다.
    pub async fn check(&self, username: &str, client_addr: &str) -> RateLimitDecision {
        let key = Self::key(username, client_addr);

        match self.store.increment(&key, self.window).await {
            Ok(window) if window.count > self.max_attempts => {
                record_rate_limit("blocked");
                tracing::warn!(
                    client_ip = %client_addr,
                    attempts = window.count,
                    "Login rate limit exceeded"
                );
                RateLimitDecision::Limited {
                    retry_after_secs: window.resets_in.as_secs_f64().ceil().max(1.0) as u64,
                }
            }
            Ok(_) => {
                record_rate_limit("allowed");
                RateLimitDecision::Allowed
            }
            Err(e) => {
                record_rate_limit("store_error");
                tracing::warn!(error = %e, "Login rate limit store failed, allowing attempt");
                RateLimitDecision::Allowed
            }
        }
    }

    /// 현재 윈도우에서 남은 시도 횟수. 저장소 에러 시 최대값.
    pub async fn remaining_attempts(&self, username: &str, client_addr: &str) -> u64 {
        let key = Self::key(username, client_addr);
        match self.store.get_count(&key).await {
            Ok(count) => self.max_attempts.saturating_sub(count),
            Err(e) => {
                tracing::warn!(error = %e, "Login rate limit store failed");
                self.max_attempts
            }
        }
    }
}

#[derive(Deserialize)]
struct LoginUsername {
    #[serde(default)]
    username: String,
}

/// 로그인 Rate Limiting 미들웨어.
///
/// JSON 본문에서 사용자 이름을 읽은 뒤 본문을 그대로 다음 핸들러에 전달합니다.
/// 본문을 해석할 수 없으면 빈 사용자 이름으로 집계합니다.
pub async fn login_rate_limit(
    State(limiter): State<LoginRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let client_addr = limiter
        .client_addr
        .client_ip(request.headers(), request.extensions());

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_LOGIN_BODY_BYTES)
        .await
        .map_err(|_| AuthError::Validation("요청 본문이 너무 큽니다".to_string()))?;

    let username = serde_json::from_slice::<LoginUsername>(&bytes)
        .map(|body| body.username)
        .unwrap_or_default();

    if let RateLimitDecision::Limited { retry_after_secs } =
        limiter.check(&username, &client_addr).await
    {
        return Err(AuthError::RateLimitExceeded { retry_after_secs });
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::{
        extract::ConnectInfo,
        http::{header::CONTENT_TYPE, StatusCode},
        middleware,
        routing::post,
        Router,
    };
    use tower::ServiceExt;

    const WINDOW: Duration = Duration::from_secs(300);

    fn limiter() -> (Arc<InMemoryRateLimitStore>, LoginRateLimiter) {
        let store = Arc::new(InMemoryRateLimitStore::new());
        (store.clone(), LoginRateLimiter::new(store, 10, WINDOW))
    }

    struct BrokenStore;

    #[async_trait]
    impl RateLimitStore for BrokenStore {
        async fn increment(&self, _: &str, _: Duration) -> Result<WindowCount, RateLimitStoreError> {
            Err(RateLimitStoreError::Unavailable("down".into()))
        }

        async fn get_count(&self, _: &str) -> Result<u64, RateLimitStoreError> {
            Err(RateLimitStoreError::Unavailable("down".into()))
        }

        async fn cleanup(&self) -> Result<usize, RateLimitStoreError> {
            Ok(0)
        }
    }

    #[test]
    fn test_key_format() {
        assert_eq!(LoginRateLimiter::key("dokter", "10.0.0.1"), "login:dokter:10.0.0.1");
        assert_eq!(LoginRateLimiter::key("", "10.0.0.1"), "login:_empty_:10.0.0.1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_eleventh_attempt_blocked_until_window_elapses() {
        let (_, limiter) = limiter();

        for i in 0..10 {
            assert_eq!(
                limiter.check("dokter", "10.0.0.1").await,
                RateLimitDecision::Allowed,
                "attempt {}",
                i + 1
            );
        }
        assert!(matches!(
            limiter.check("dokter", "10.0.0.1").await,
            RateLimitDecision::Limited { retry_after_secs } if retry_after_secs <= 300
        ));

        tokio::time::advance(WINDOW).await;
        assert_eq!(limiter.check("dokter", "10.0.0.1").await, RateLimitDecision::Allowed);
        assert_eq!(limiter.remaining_attempts("dokter", "10.0.0.1").await, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let (_, limiter) = limiter();

        for _ in 0..11 {
            limiter.check("dokter", "10.0.0.1").await;
        }
        assert_eq!(limiter.check("dokter", "10.0.0.2").await, RateLimitDecision::Allowed);
        assert_eq!(limiter.check("perawat", "10.0.0.1").await, RateLimitDecision::Allowed);
        assert_eq!(limiter.remaining_attempts("dokter", "10.0.0.1").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_username_still_counted() {
        let (_, limiter) = limiter();

        for _ in 0..10 {
            limiter.check("", "10.0.0.1").await;
        }
        assert!(matches!(
            limiter.check("", "10.0.0.1").await,
            RateLimitDecision::Limited { .. }
        ));
    }

    #[tokio::test]
    async fn test_store_error_fails_open() {
        let limiter = LoginRateLimiter::new(Arc::new(BrokenStore), 1, WINDOW);

        for _ in 0..5 {
            assert_eq!(limiter.check("dokter", "10.0.0.1").await, RateLimitDecision::Allowed);
        }
        assert_eq!(limiter.remaining_attempts("dokter", "10.0.0.1").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_removes_expired_windows() {
        let (store, limiter) = limiter();
        limiter.check("dokter", "10.0.0.1").await;
        limiter.check("perawat", "10.0.0.1").await;

        assert_eq!(store.cleanup().await.unwrap(), 0);
        tokio::time::advance(WINDOW).await;
        assert_eq!(store.cleanup().await.unwrap(), 2);
        assert_eq!(store.tracked_keys().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep() {
        let (store, limiter) = limiter();
        let shutdown = CancellationToken::new();
        let handle = store
            .clone()
            .spawn_cleanup(Duration::from_secs(60), shutdown.clone());

        limiter.check("dokter", "10.0.0.1").await;
        tokio::time::sleep(WINDOW + Duration::from_secs(61)).await;
        assert_eq!(store.tracked_keys().await, 0);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_sweep_interval_does_not_panic() {
        let (store, limiter) = limiter();
        let shutdown = CancellationToken::new();
        let handle = store.clone().spawn_cleanup(Duration::ZERO, shutdown.clone());

        limiter.check("dokter", "10.0.0.1").await;
        tokio::time::sleep(WINDOW + Duration::from_secs(2)).await;
        assert_eq!(store.tracked_keys().await, 0);

        shutdown.cancel();
        handle.await.unwrap();
    }

    fn login_request(username: &str, forwarded_for: &str) -> Request {
        let mut request = axum::http::Request::builder()
            .method("POST")
            .uri("/login")
            .header(CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", forwarded_for)
            .body(Body::from(format!(r#"{{"username":"{username}","password":"x"}}"#)))
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 1], 50000))));
        request
    }

    fn login_app(limiter: LoginRateLimiter) -> Router {
        Router::new()
            .route("/login", post(|body: String| async move { body }))
            .layer(middleware::from_fn_with_state(limiter, login_rate_limit))
    }

    #[tokio::test(start_paused = true)]
    async fn test_middleware_blocks_and_preserves_body() {
        let (_, limiter) = limiter();
        let app = login_app(limiter);

        for _ in 0..10 {
            let response = app
                .clone()
                .oneshot(login_request("dokter", "203.0.113.9"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert!(String::from_utf8_lossy(&body).contains("\"username\":\"dokter\""));
        }

        let response = app
            .clone()
            .oneshot(login_request("dokter", "203.0.113.9"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(axum::http::header::RETRY_AFTER));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotating_forwarded_for_does_not_reset_counter() {
        let (store, limiter) = limiter();
        let app = login_app(limiter);

        let mut statuses = Vec::new();
        for i in 0..50 {
            let response = app
                .clone()
                .oneshot(login_request("dokter", &format!("198.51.100.{i}")))
                .await
                .unwrap();
            statuses.push(response.status());
        }

        assert!(statuses[..10].iter().all(|s| *s == StatusCode::OK));
        assert!(statuses[10..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
        // 모든 시도가 소켓 주소 하나로 집계됨
        assert_eq!(store.tracked_keys().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwarded_for_keys_counter_behind_trusted_proxy() {
        let (store, limiter) = limiter();
        let app = login_app(limiter.with_client_addr_policy(ClientAddrPolicy::new(true)));

        for i in 0..11 {
            let response = app
                .clone()
                .oneshot(login_request("dokter", &format!("198.51.100.{i}")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(store.tracked_keys().await, 11);

        for _ in 0..10 {
            app.clone()
                .oneshot(login_request("dokter", "203.0.113.9"))
                .await
                .unwrap();
        }
        let response = app
            .clone()
            .oneshot(login_request("dokter", "203.0.113.9"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
