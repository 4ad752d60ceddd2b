//! 감사 로그 싱크.
//!
//! - [`TracingAuditSink`]: `audit` 타겟의 구조화된 tracing 이벤트로 기록
//! - [`JsonlAuditSink`]: UTC 일자별 JSON Lines 파일에 추가 기록
//! - [`MemoryAuditSink`]: 테스트용

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use simrs_core::{AuditConfig, AuditError, AuditEvent, AuditSink, AuditSinkKind};
use tokio::io::AsyncWriteExt;

/// 설정에 따라 감사 싱크를 생성합니다.
pub fn build_audit_sink(config: &AuditConfig) -> Arc<dyn AuditSink> {
    match config.sink {
        AuditSinkKind::Tracing => Arc::new(TracingAuditSink),
        AuditSinkKind::File => Arc::new(JsonlAuditSink::new(&config.directory)),
    }
}

/// tracing 기반 감사 싱크.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let before = event.before.as_ref().map(serde_json::to_string).transpose()?;
        let after = event.after.as_ref().map(serde_json::to_string).transpose()?;

        tracing::info!(
            target: "audit",
            action = event.action.as_str(),
            module = %event.module,
            table = %event.table,
            primary_key = %event.primary_key,
            business_key = event.business_key.as_deref(),
            actor_id = ?event.actor_id,
            ip_address = event.ip_address.as_deref(),
            before = before.as_deref(),
            after = after.as_deref(),
            "{}",
            event.summary
        );
        Ok(())
    }
}

/// JSON Lines 파일 감사 싱크.
///
/// `audit-YYYY-MM-DD.jsonl` 파일에 이벤트 하나당 한 줄을 추가합니다.
/// 쓰기는 내부 잠금으로 직렬화되어 줄이 섞이지 않습니다.
#[derive(Debug)]
pub struct JsonlAuditSink {
    directory: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// 주어진 시각이 기록될 파일 경로.
    pub fn file_for(&self, at: DateTime<Utc>) -> PathBuf {
        self.directory
            .join(format!("audit-{}.jsonl", at.format("%Y-%m-%d")))
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.directory).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_for(event.occurred_at))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// 이벤트를 메모리에 보관하는 싱크.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기록된 이벤트 사본.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(())
    }
}
