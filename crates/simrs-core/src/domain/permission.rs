//! 권한 코드 및 사용자별 권한 오버라이드.
//!
//! 권한 코드는 `domain.action` 형식입니다 (예: `vedika.read`, `session.revoke`).
//! 사용자의 유효 권한 집합은 저장되지 않고 항상 다음과 같이 파생됩니다:
//!
//! ```text
//! (역할 권한의 합집합) - REVOKE 오버라이드 + GRANT 오버라이드
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 권한 정의.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Permission {
    /// 권한 ID
    pub id: Uuid,
    /// `domain.action` 형식의 코드
    pub code: String,
    /// 설명
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Permission {
    /// 새 권한을 생성합니다.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            description: None,
        }
    }

    /// `domain.action` 형식인지 확인.
    ///
    /// 점으로 구분된 조각이 두 개 이상이고, 각 조각은 비어 있지 않은 소문자/숫자/`_`입니다.
    pub fn is_valid_code(code: &str) -> bool {
        code.contains('.')
            && code.split('.').all(|part| {
                !part.is_empty()
                    && part
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            })
    }
}

/// 오버라이드 효과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub enum OverrideEffect {
    /// 역할과 무관하게 권한 부여
    Grant,
    /// 역할이 부여한 권한이라도 회수 (항상 우선)
    Revoke,
}

impl OverrideEffect {
    /// 저장소 표현 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideEffect::Grant => "GRANT",
            OverrideEffect::Revoke => "REVOKE",
        }
    }
}

impl fmt::Display for OverrideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 알 수 없는 오버라이드 효과 문자열.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("알 수 없는 오버라이드 효과: {0}")]
pub struct ParseOverrideEffectError(pub String);

impl FromStr for OverrideEffect {
    type Err = ParseOverrideEffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GRANT" => Ok(OverrideEffect::Grant),
            "REVOKE" => Ok(OverrideEffect::Revoke),
            _ => Err(ParseOverrideEffectError(s.to_string())),
        }
    }
}

/// 사용자별 권한 오버라이드.
///
/// (user_id, permission_id) 쌍마다 정확히 한 행만 존재합니다 (upsert, 마지막 쓰기 우선).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct UserPermissionOverride {
    pub user_id: Uuid,
    pub permission_id: Uuid,
    /// 조인된 권한 코드
    pub code: String,
    pub effect: OverrideEffect,
    pub created_at: DateTime<Utc>,
}

/// 역할 파생 권한에 오버라이드를 적용하여 유효 권한 집합을 계산합니다.
///
/// 역할 집합에서 REVOKE 코드를 모두 제거한 뒤 GRANT 코드를 모두 추가합니다.
/// 코드당 오버라이드가 하나뿐이므로 결과는 오버라이드 순서와 무관합니다.
pub fn apply_overrides<R, O>(role_codes: R, overrides: O) -> HashSet<String>
where
    R: IntoIterator<Item = String>,
    O: IntoIterator<Item = (String, OverrideEffect)>,
{
    let mut effective: HashSet<String> = role_codes.into_iter().collect();
    let mut grants = Vec::new();

    for (code, effect) in overrides {
        match effect {
            OverrideEffect::Revoke => {
                effective.remove(&code);
            }
            OverrideEffect::Grant => grants.push(code),
        }
    }

    effective.extend(grants);
    effective
}
