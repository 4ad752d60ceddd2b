//! 세션 활동 갱신 워커.
//!
//! 인증 가드는 `last_seen_at` 갱신을 기다리지 않고 제한된 큐에 넣기만 합니다.
//! 디스패처 태스크가 큐를 비우며 세마포어로 동시 실행 수를 제한하고,
//! 각 갱신은 자체 타임아웃을 가집니다. 갱신은 요청 취소와 무관하게 실행되며,
//! 실패는 로그와 메트릭으로만 남습니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::session::SessionManager;
use crate::metrics::record_session_touch;

/// 워커 설정.
#[derive(Debug, Clone, Copy)]
pub struct LivenessConfig {
    /// 대기 큐 용량. 가득 차면 새 갱신은 버려집니다.
    pub queue_capacity: usize,
    /// 동시에 실행되는 갱신 최대 수
    pub max_in_flight: usize,
    /// 갱신 하나의 타임아웃
    pub timeout: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_in_flight: 16,
            timeout: Duration::from_secs(5),
        }
    }
}

impl LivenessConfig {
    pub fn from_settings(settings: &simrs_core::SessionConfig) -> Self {
        Self {
            queue_capacity: settings.touch_queue_capacity,
            max_in_flight: settings.touch_max_in_flight,
            timeout: settings.touch_timeout(),
        }
    }
}

/// 갱신 요청을 큐에 넣는 핸들.
#[derive(Debug, Clone)]
pub struct LivenessDispatcher {
    tx: mpsc::Sender<Uuid>,
}

impl LivenessDispatcher {
    /// 디스패처 태스크를 시작합니다.
    ///
    /// `shutdown`이 취소되면 새 요청 수신을 멈춥니다. 이미 실행 중인 갱신은 타임아웃까지 진행됩니다.
    pub fn spawn(
        sessions: SessionManager,
        config: LivenessConfig,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let handle = tokio::spawn(run_dispatcher(sessions, config, rx, shutdown));
        (Self { tx }, handle)
    }

    /// 갱신을 예약합니다. 큐가 가득 찼거나 워커가 종료되었으면 `false`.
    pub fn schedule(&self, session_id: Uuid) -> bool {
        match self.tx.try_send(session_id) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                record_session_touch("dropped");
                tracing::debug!(session_id = %session_id, "Liveness queue full, touch dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                record_session_touch("dropped");
                false
            }
        }
    }
}

async fn run_dispatcher(
    sessions: SessionManager,
    config: LivenessConfig,
    mut rx: mpsc::Receiver<Uuid>,
    shutdown: CancellationToken,
) {
    let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
    tracing::debug!(
        queue_capacity = config.queue_capacity,
        max_in_flight = config.max_in_flight,
        "Liveness worker started"
    );

    loop {
        let session_id = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = rx.recv() => match next {
                Some(id) => id,
                None => break,
            },
        };

        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let sessions = sessions.clone();
        let timeout = config.timeout;
        tokio::spawn(async move {
            let _permit = permit;
            match tokio::time::timeout(timeout, sessions.touch_last_seen(session_id)).await {
                Ok(Ok(())) => record_session_touch("ok"),
                Ok(Err(e)) => {
                    record_session_touch("error");
                    tracing::warn!(session_id = %session_id, error = %e, "Failed to update last_seen_at");
                }
                Err(_) => {
                    record_session_touch("timeout");
                    tracing::warn!(session_id = %session_id, "last_seen_at update timed out");
                }
            }
        });
    }

    tracing::debug!("Liveness worker stopped");
}
