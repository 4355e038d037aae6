//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 알림 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.
//! 캐시 메트릭(`cache_lookups_total`, `cache_entries`)은 `watch-data`에서 기록합니다.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설치하고 렌더링 핸들을 반환합니다.
///
/// 레코더가 이미 설치되어 있으면 에러입니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .set_buckets_for_metric(
            Matcher::Full("alert_check_duration_seconds".to_string()),
            &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭
// ============================================================================

pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

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

/// upstream 장애로 stale 캐시를 반환한 응답.
pub fn record_stale_response(path: &str) {
    counter!("http_stale_responses_total", "path" => path.to_string()).increment(1);
}

// ============================================================================
// 알림 메트릭
// ============================================================================

/// 알림 트리거 카운터 증가.
pub fn record_alert_triggered(condition: &str) {
    counter!("alerts_triggered_total", "condition" => condition.to_string()).increment(1);
}

/// 알림 검사 한 회차 기록.
pub fn record_alert_check(evaluated: usize, duration_secs: f64) {
    counter!("alert_checks_total").increment(1);
    gauge!("alerts_active").set(evaluated as f64);
    histogram!("alert_check_duration_seconds").record(duration_secs);
}

// ============================================================================
// 경로 정규화
// ============================================================================

/// 심볼이 뒤따르는 컬렉션 세그먼트.
const SYMBOL_COLLECTIONS: [&str; 3] = ["stocks", "indices", "cache"];

/// 심볼 자리에 올 수 있는 고정 경로.
const STATIC_SEGMENTS: [&str; 6] = ["search", "stats", "invalidate", "cleanup", "check", "events"];

/// 경로에서 동적 파라미터를 정규화해 메트릭 라벨 수를 제한합니다.
///
/// 예: `/api/v1/watchlists/123e4567-.../stocks/AAPL` → `/api/v1/watchlists/{id}/stocks/{symbol}`
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut normalized = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let is_uuid = segment.len() == 36 && segment.chars().filter(|c| *c == '-').count() == 4;
        let is_numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
        let after_collection = i > 0 && SYMBOL_COLLECTIONS.contains(&segments[i - 1]);

        if is_uuid || is_numeric {
            normalized.push("{id}".to_string());
        } else if after_collection && !segment.is_empty() && !STATIC_SEGMENTS.contains(segment) {
            normalized.push("{symbol}".to_string());
        } else {
            normalized.push((*segment).to_string());
        }
    }
    normalized.join("/")
}
