//! 사용자 및 역할.
//!
//! 사용자 CRUD는 사용자 관리 모듈의 책임이며, 인증 코어는 id와 활성 플래그만 읽습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 시스템 사용자.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct User {
    /// 사용자 ID
    pub id: Uuid,
    /// 로그인 이름 (고유)
    pub username: String,
    /// 이메일
    pub email: String,
    /// PHC 형식 비밀번호 해시 (응답에 절대 포함하지 않음)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// 활성 여부
    pub is_active: bool,
    /// 마지막 로그인 시간
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// 새 활성 사용자를 생성합니다.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            is_active: true,
            last_login_at: None,
        }
    }

    /// 비활성 상태로 전환합니다.
    #[must_use]
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// 역할.
///
/// 역할에 부여된 권한은 `role_permissions` 다대다 관계로 표현됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Role {
    /// 역할 ID
    pub id: Uuid,
    /// 역할 이름 (예: "admin", "casemix")
    pub name: String,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User::new("dokter", "dokter@example.com", "$argon2id$v=19$secret");
        let json = serde_json::to_string(&user).unwrap();

        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
        assert!(json.contains("\"username\":\"dokter\""));
    }

    #[test]
    fn test_deactivated() {
        let user = User::new("perawat", "perawat@example.com", "hash").deactivated();
        assert!(!user.is_active);
    }
}
