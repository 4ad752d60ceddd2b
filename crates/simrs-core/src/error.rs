//! 저장소 및 협력자 에러 타입.
//!
//! 백엔드 저장소(PostgreSQL, 인메모리 등)에서 발생하는 에러를 하나의 타입으로 통합합니다.
//! 이 에러의 상세 내용은 로그에만 남고 클라이언트에는 노출되지 않습니다.

use thiserror::Error;

/// 저장소 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),

    /// 백엔드 연결 불가
    #[error("저장소 사용 불가: {0}")]
    Unavailable(String),

    /// 저장된 데이터가 도메인 규칙과 맞지 않음
    #[error("잘못된 저장 데이터: {0}")]
    Corrupted(String),

    /// 기타 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

#[cfg(feature = "sqlx-support")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupted(err.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// 저장소 Result 타입.
pub type StoreResult<T> = Result<T, StoreError>;

/// 감사 로그 기록 에러.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("감사 로그 기록 실패: {0}")]
    Io(#[from] std::io::Error),

    #[error("감사 이벤트 직렬화 실패: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 비밀번호 해싱 에러.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패: {0}")]
    Hash(String),

    #[error("잘못된 비밀번호 해시 형식: {0}")]
    InvalidHash(String),
}
