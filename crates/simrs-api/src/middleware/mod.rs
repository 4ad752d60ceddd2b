//! API 서버용 HTTP middleware.
//!
//! 요청 처리 파이프라인에 적용되는 middleware 모듈.
//! 인증/인가 가드는 [`crate::auth`]에 있습니다.

mod client;
mod metrics;
mod rate_limit;

pub use client::{ClientAddrPolicy, ClientInfo, UNKNOWN_CLIENT};
pub use metrics::metrics_layer;
pub use rate_limit::{
    login_rate_limit, InMemoryRateLimitStore, LoginRateLimiter, RateLimitDecision,
    RateLimitStore, RateLimitStoreError, RedisRateLimitStore, WindowCount,
    EMPTY_USERNAME_SENTINEL,
};
