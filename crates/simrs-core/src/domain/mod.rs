//! 인증/인가 도메인 모델.
//!
//! - [`user`]: 사용자 및 역할
//! - [`permission`]: 권한 코드 및 사용자별 오버라이드
//! - [`session`]: 로그인 세션
//! - [`audit`]: 감사 로그 이벤트

pub mod audit;
pub mod permission;
pub mod session;
pub mod user;

pub use audit::{AuditAction, AuditEvent};
pub use permission::{apply_overrides, OverrideEffect, ParseOverrideEffectError, Permission, UserPermissionOverride};
pub use session::LoginSession;
pub use user::{Role, User};
