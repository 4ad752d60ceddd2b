//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 인증 관련 카운터를 수집하고 `/metrics` 엔드포인트로 노출합니다.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설치하고 렌더링 핸들을 반환합니다.
///
/// 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭
// ============================================================================

pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 인증 메트릭
// ============================================================================

/// 로그인 결과 (`success`, `invalid_credentials`, `inactive`, `error`).
pub fn record_login(result: &'static str) {
    counter!("auth_login_total", "result" => result).increment(1);
}

/// 로그인 Rate Limit 판정 (`allowed`, `blocked`, `store_error`).
pub fn record_rate_limit(status: &'static str) {
    counter!("login_rate_limit_total", "status" => status).increment(1);
}

/// 세션 활동 갱신 결과 (`ok`, `error`, `timeout`, `dropped`).
pub fn record_session_touch(result: &'static str) {
    counter!("session_touch_total", "result" => result).increment(1);
}

/// 권한 확인 결과 (`granted`, `denied`, `cached`, `error`).
pub fn record_permission_check(result: &'static str) {
    counter!("permission_checks_total", "result" => result).increment(1);
}

// ============================================================================
// 경로 정규화
// ============================================================================

/// 경로의 동적 세그먼트를 정규화하여 라벨 카디널리티를 제한합니다.
///
/// 예: `/auth/sessions/123e4567-e89b-12d3-a456-426614174000/revoke` → `/auth/sessions/:id/revoke`
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let is_uuid = segment.len() == 36 && segment.chars().filter(|c| *c == '-').count() == 4;
            let is_numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());

            if is_uuid || is_numeric {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
