//! 세션 활동 갱신 스로틀.
//!
//! 한 세션에서 요청이 아무리 많아도 `last_seen_at` 쓰기는 간격당 최대 한 번입니다.
//! 로그아웃이나 폐기로 끝난 세션의 항목은 [`LastSeenThrottle::forget`]으로 지웁니다.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

/// 기본 갱신 간격.
pub const DEFAULT_LAST_SEEN_INTERVAL: Duration = Duration::from_secs(60);

/// 세션별 마지막 갱신 시각 기록.
#[derive(Debug)]
pub struct LastSeenThrottle {
    interval: Duration,
    last_touch: RwLock<HashMap<Uuid, Instant>>,
}

impl Default for LastSeenThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_LAST_SEEN_INTERVAL)
    }
}

impl LastSeenThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_touch: RwLock::new(HashMap::new()),
        }
    }

    /// 이번 요청이 갱신을 예약해야 하는지 판정하고, 그렇다면 시각을 기록합니다.
    ///
    /// 일반적인 경우(최근에 갱신됨)는 공유 잠금만 사용합니다.
    pub async fn should_touch(&self, session_id: Uuid) -> bool {
        let now = Instant::now();

        {
            let map = self.last_touch.read().await;
            if let Some(last) = map.get(&session_id) {
                if now.duration_since(*last) < self.interval {
                    return false;
                }
            }
        }

        let mut map = self.last_touch.write().await;
        // 읽기 잠금을 놓은 사이 다른 요청이 먼저 기록했을 수 있음
        if let Some(last) = map.get(&session_id) {
            if now.duration_since(*last) < self.interval {
                return false;
            }
        }
        map.insert(session_id, now);
        true
    }

    /// 폐기된 세션 항목 제거.
    pub async fn forget(&self, session_id: Uuid) {
        self.last_touch.write().await.remove(&session_id);
    }
}
