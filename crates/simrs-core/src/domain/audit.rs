//! 감사 로그 이벤트.
//!
//! 로그아웃, 세션 폐기, 권한 오버라이드 변경은 구조화된 감사 이벤트로 기록됩니다.
//! 이벤트를 영구 저장하는 것은 [`AuditSink`](crate::store::AuditSink) 구현의 책임입니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 감사 대상 작업.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Insert,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Insert => "INSERT",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

/// 구조화된 감사 이벤트.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    /// 발생 모듈 (예: "auth", "permission")
    pub module: String,
    /// 대상 테이블
    pub table: String,
    /// 대상 레코드 기본 키
    pub primary_key: String,
    /// 사람이 읽을 수 있는 비즈니스 키 (예: 사용자명 + 권한 코드)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_key: Option<String>,
    /// 작업 수행자
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    /// 새 이벤트를 생성합니다.
    pub fn new(
        action: AuditAction,
        module: impl Into<String>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            action,
            module: module.into(),
            table: table.into(),
            primary_key: primary_key.into(),
            business_key: None,
            actor_id: None,
            ip_address: None,
            summary: summary.into(),
            before: None,
            after: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn update(
        module: impl Into<String>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self::new(AuditAction::Update, module, table, primary_key, summary)
    }

    pub fn delete(
        module: impl Into<String>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self::new(AuditAction::Delete, module, table, primary_key, summary)
    }

    #[must_use]
    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    #[must_use]
    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    #[must_use]
    pub fn with_business_key(mut self, key: impl Into<String>) -> Self {
        self.business_key = Some(key.into());
        self
    }

    /// 변경 전/후 데이터를 설정합니다.
    #[must_use]
    pub fn with_change(mut self, before: Option<Value>, after: Option<Value>) -> Self {
        self.before = before;
        self.after = after;
        self
    }
}
