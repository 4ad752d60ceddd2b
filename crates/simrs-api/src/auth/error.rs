//! 인증/인가 에러 분류.
//!
//! 클라이언트에는 안정적인 코드와 고정 메시지만 노출합니다.
//! SQL 에러 등 내부 상세는 로그에만 남깁니다.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use simrs_core::{PasswordError, StoreError};

use super::jwt::JwtError;
use crate::error::ApiErrorResponse;

/// 인증/인가 에러.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("사용자 이름 또는 비밀번호가 올바르지 않습니다")]
    InvalidCredentials,

    #[error("비활성화된 사용자입니다")]
    UserInactive,

    #[error("유효하지 않은 인증 토큰입니다")]
    InvalidToken,

    #[error("인증 토큰이 만료되었습니다")]
    ExpiredToken,

    /// 세션이 없거나 폐기됨 (두 경우를 구분하지 않음)
    #[error("세션이 폐기되었습니다")]
    SessionRevoked,

    #[error("유효하지 않은 리프레시 토큰입니다")]
    InvalidRefreshToken,

    /// 명시적 폐기 요청 대상이 이미 비활성이거나 없음
    #[error("세션을 찾을 수 없습니다")]
    SessionNotFound,

    #[error("로그인 시도 횟수를 초과했습니다. 잠시 후 다시 시도하세요")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("권한이 없습니다")]
    Forbidden,

    /// 권한 확인 중 저장소 에러. 항상 거부로 처리.
    #[error("권한 확인 실패: {0}")]
    PermissionCheckFailed(String),

    #[error("사용자를 찾을 수 없습니다")]
    UserNotFound,

    #[error("권한을 찾을 수 없습니다: {0}")]
    PermissionNotFound(String),

    #[error("잘못된 요청: {0}")]
    Validation(String),

    #[error("내부 서버 에러: {0}")]
    Internal(String),
}

impl AuthError {
    /// 안정적인 에러 코드.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::UserInactive => "USER_INACTIVE",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::ExpiredToken => "EXPIRED_TOKEN",
            AuthError::SessionRevoked => "SESSION_REVOKED",
            AuthError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AuthError::SessionNotFound => "SESSION_NOT_FOUND",
            AuthError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::PermissionNotFound(_) => "PERMISSION_NOT_FOUND",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::PermissionCheckFailed(_) | AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP 상태 코드.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::UserInactive
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::SessionRevoked
            | AuthError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::SessionNotFound
            | AuthError::UserNotFound
            | AuthError::PermissionNotFound(_) => StatusCode::NOT_FOUND,
            AuthError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::PermissionCheckFailed(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AuthError::PermissionCheckFailed(_) | AuthError::Internal(_) => {
                "내부 서버 에러가 발생했습니다".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::ExpiredToken,
            JwtError::Invalid => AuthError::InvalidToken,
            JwtError::Encoding(e) => AuthError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }

        let body = Json(ApiErrorResponse::new(self.code(), self.public_message()));
        let mut response = (status, body).into_response();

        if let AuthError::RateLimitExceeded { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::SessionRevoked.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::ExpiredToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::RateLimitExceeded { retry_after_secs: 30 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::PermissionCheckFailed("db down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let err = AuthError::Internal("relation \"login_sessions\" does not exist".into());
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(!err.public_message().contains("login_sessions"));
    }

    #[test]
    fn test_jwt_error_conversion() {
        assert!(matches!(AuthError::from(JwtError::Expired), AuthError::ExpiredToken));
        assert!(matches!(AuthError::from(JwtError::Invalid), AuthError::InvalidToken));
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = AuthError::RateLimitExceeded { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "42");
    }
}
