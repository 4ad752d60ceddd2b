//! 통합 API 에러 응답 타입.
//!
//! 모든 에러 응답은 안정적인 기계 판독용 코드와 사람이 읽을 수 있는 메시지를 가집니다.
//!
//! ```json
//! {
//!   "code": "SESSION_REVOKED",
//!   "message": "세션이 폐기되었습니다",
//!   "timestamp": 1738300800
//! }
//! ```

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::auth::AuthError;

/// 통합 API 에러 응답.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "INVALID_TOKEN", "FORBIDDEN")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 상세 정보
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 시각 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 타임스탬프가 포함된 에러를 생성합니다.
    ///
    /// ```
    /// use simrs_api::error::ApiErrorResponse;
    ///
    /// let error = ApiErrorResponse::new("FORBIDDEN", "권한이 없습니다");
    /// assert_eq!(error.code(), "FORBIDDEN");
    /// ```
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 상세 정보를 추가합니다.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

// ==================== Result Type Alias ====================

/// API 핸들러 Result 타입.
pub type ApiResult<T> = Result<T, AuthError>;

// ==================== 요청 검증 ====================

/// 필드 검증 에러를 하나의 메시지로 합칩니다.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

/// JSON 본문을 역직렬화하고 `validator` 규칙으로 검증하는 추출기.
///
/// 역직렬화 실패와 검증 실패 모두 `VALIDATION_ERROR`로 응답합니다.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AuthError::Validation(rejection.body_text()))?;

        value
            .validate()
            .map_err(|errors| AuthError::Validation(validation_message(&errors)))?;

        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Validate)]
    struct Probe {
        #[validate(length(min = 1, message = "이름은 비어 있을 수 없습니다"))]
        name: String,
    }

    #[test]
    fn test_display_includes_code() {
        let error = ApiErrorResponse::new("FORBIDDEN", "권한이 없습니다");
        assert_eq!(error.to_string(), "[FORBIDDEN] 권한이 없습니다");
        assert!(error.timestamp.is_some());
    }

    #[test]
    fn test_validation_message_uses_custom_text() {
        let probe = Probe {
            name: String::new(),
        };
        let errors = probe.validate().unwrap_err();
        assert_eq!(validation_message(&errors), "이름은 비어 있을 수 없습니다");
    }
}
