//! 캐시 정리 태스크.
//!
//! 주기적으로 보관 기간이 지난 확장 데이터 캐시 행과 만료된 시세를 삭제합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::state::AppState;

/// 한 회차 정리 결과: (캐시 행, 시세)
pub async fn run_cleanup(state: &AppState) -> watch_data::Result<(u64, usize)> {
    let rows = state.cache.cleanup().await?;
    let quotes = state.quotes.purge_expired().await;
    debug!(rows = rows, quotes = quotes, "캐시 정리 회차 완료");
    Ok((rows, quotes))
}

/// 캐시 정리 태스크 시작.
pub fn start_cache_janitor(
    state: Arc<AppState>,
    cleanup_interval: Duration,
    shutdown_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = cleanup_interval.as_secs(), "캐시 정리 태스크 시작");

        let mut ticker = interval(cleanup_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 시작 직후 실행하지 않음
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = run_cleanup(&state).await {
                        error!(error = %e, "캐시 정리 실패");
                    }
                }
                _ = shutdown_token.cancelled() => {
                    info!("캐시 정리 태스크: 종료 시그널 수신");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;
    use watch_core::DataCategory;
    use watch_data::CacheEntry;

    use crate::state::create_test_state;

    #[tokio::test]
    async fn test_run_cleanup_removes_old_rows() {
        let state = create_test_state();
        let now = Utc::now();
        let store = state.cache.store();

        let old = CacheEntry::fresh(
            "AAPL",
            DataCategory::Holders,
            json!({}),
            now - ChronoDuration::days(30),
            now - ChronoDuration::days(20),
        );
        let recent = CacheEntry::fresh(
            "AAPL",
            DataCategory::Extended,
            json!({}),
            now,
            now + ChronoDuration::hours(1),
        );
        store.upsert(&old).await.unwrap();
        store.upsert(&recent).await.unwrap();

        let (rows, _) = run_cleanup(&state).await.unwrap();
        assert_eq!(rows, 1);
        assert!(store.get("AAPL", DataCategory::Extended).await.unwrap().is_some());
        assert!(store.get("AAPL", DataCategory::Holders).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_stops_on_shutdown() {
        let state = Arc::new(create_test_state());
        let token = CancellationToken::new();
        let handle = start_cache_janitor(state, Duration::from_secs(3600), token.clone());

        token.cancel();
        assert!(handle.await.is_ok());
    }
}
