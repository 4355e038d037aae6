//! 백그라운드 태스크 모듈.
//!
//! - 알림 폴러: 고정 주기로 활성 가격 알림 평가
//! - 캐시 정리: 보관 기간이 지난 캐시 행 삭제

pub mod alert_poller;
pub mod cache_janitor;

pub use alert_poller::{
    check_alerts, evaluate_rules, start_alert_poller, AlertCheckError, AlertCheckSummary,
    AlertPollerConfig, RuleWrite,
};
pub use cache_janitor::{run_cleanup, start_cache_janitor};
