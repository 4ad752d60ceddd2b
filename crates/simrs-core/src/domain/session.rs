//! 로그인 세션.
//!
//! 세션은 로그인 시 생성되고 물리적으로 삭제되지 않습니다.
//! `revoked_at`이 설정된 세션은 영구히 비활성이며 다시 활성화되지 않습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 서버 측 로그인 세션 레코드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct LoginSession {
    /// 세션 ID (UUID v4, 추측 불가)
    pub id: Uuid,
    /// 소유 사용자
    pub user_id: Uuid,
    /// 현재 리프레시 토큰의 SHA-256 해시 (원본 토큰은 저장하지 않음)
    #[serde(skip_serializing)]
    pub refresh_token_hash: String,
    /// 디바이스 정보 (User-Agent)
    pub device_info: Option<String>,
    /// 클라이언트 주소
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// 폐기 시간 (설정되면 영구 비활성)
    pub revoked_at: Option<DateTime<Utc>>,
}

impl LoginSession {
    /// 새 활성 세션을 생성합니다.
    pub fn new(
        user_id: Uuid,
        refresh_token_hash: impl Into<String>,
        device_info: Option<String>,
        ip_address: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            refresh_token_hash: refresh_token_hash.into(),
            device_info,
            ip_address,
            created_at: now,
            last_seen_at: now,
            revoked_at: None,
        }
    }

    /// 세션이 활성 상태인지 확인.
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }

    /// 세션이 주어진 사용자 소유인지 확인.
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}
