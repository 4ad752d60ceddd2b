//! # SIMRS Core
//!
//! SIMRS 백엔드의 인증/인가 핵심 도메인 모델과 협력자 계약을 제공합니다.
//!
//! 이 크레이트는 HTTP 계층과 저장소 구현 모두에서 사용하는 기본 타입을 제공합니다:
//! - 사용자, 역할, 권한, 사용자별 권한 오버라이드
//! - 로그인 세션 (soft lifecycle, 폐기 단조성)
//! - 저장소 계약 (`UserStore`, `SessionStore`, `PermissionStore`)
//! - 감사 로그 이벤트 및 `AuditSink` 계약
//! - 비밀번호 해싱 계약 (`CredentialHasher`)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod store;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use store::*;
