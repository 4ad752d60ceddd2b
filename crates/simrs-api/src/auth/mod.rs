//! 세션 기반 인증 및 세분화된 권한 부여.
//!
//! # 구성 요소
//!
//! - [`TokenCodec`]: 액세스/리프레시 토큰 서명 및 검증
//! - [`SessionManager`]: 서버 측 세션 수명 주기
//! - [`PermissionResolver`] / [`PermissionCache`]: 유효 권한 계산과 요청 단위 캐시
//! - [`authenticate`] / [`permission_gate`]: 인증 가드와 인가 가드 미들웨어
//! - [`LastSeenThrottle`] / [`LivenessDispatcher`]: 세션 활동 갱신 스로틀과 워커
//! - [`AuthService`]: 로그인, 로그아웃, 세션/오버라이드 관리 유스케이스
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn protected_handler(auth: Authenticated) -> impl IntoResponse {
//!     format!("Hello, {}!", auth.context.user_id)
//! }
//! ```

pub mod error;
pub mod jwt;
pub mod liveness;
pub mod middleware;
pub mod password;
pub mod permissions;
pub mod service;
pub mod session;
pub mod throttle;

pub use error::AuthError;
pub use jwt::{Claims, IssuedToken, JwtError, TokenCodec, TokenKind, TokenPair, VerifiedToken};
pub use liveness::{LivenessConfig, LivenessDispatcher};
pub use middleware::{
    authenticate, bearer_token, permission_gate, AuthContext, AuthGuard, Authenticated,
    PermissionGate,
};
pub use password::Argon2Hasher;
pub use permissions::{PermissionCache, PermissionResolver};
pub use service::{
    AuthService, LoginOutcome, OverrideChange, SessionBrief, SessionView, UserProfile,
    PERMISSION_MANAGE_PERMISSION, SESSION_REVOKE_PERMISSION,
};
pub use session::{refresh_token_fingerprint, IssuedSession, SessionManager};
pub use throttle::{LastSeenThrottle, DEFAULT_LAST_SEEN_INTERVAL};
