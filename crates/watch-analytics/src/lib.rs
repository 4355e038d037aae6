//! 가격 시계열 파생 지표 및 종목 스크리닝.
//!
//! 이 크레이트는 이미 조회한 시계열에 대한 순수 계산만 제공합니다:
//! - 낙폭 (drawdown) 시계열, 최대/현재 낙폭
//! - 기간별 성과 및 벤치마크 대비 상대 성과
//! - 스파크라인 정규화
//! - 볼륨 프로파일 (매물대)
//! - 피보나치 되돌림/확장 레벨
//! - 스크리너 필터/정렬/프리셋
//!
//! 모든 함수는 시간 오름차순으로 정렬된 시계열을 가정하며, 데이터가 부족하면
//! 빈 결과 또는 `None`을 반환합니다.

pub mod drawdown;
pub mod fibonacci;
pub mod metrics;
pub mod performance;
pub mod screener;
pub mod sparkline;
pub mod volume_profile;

pub use drawdown::{current_drawdown, drawdown_series, max_drawdown, DrawdownPoint, MaxDrawdown};
pub use fibonacci::{fibonacci_levels, FibLevel, FibonacciLevels, SwingDirection};
pub use metrics::{MetricsOptions, StockMetrics};
pub use performance::{
    performance_deltas, relative_performance, PerformanceDelta, PerformanceWindow,
    RelativePerformance,
};
pub use screener::{
    preset, presets, screen, ScreenerFilter, ScreenerPreset, ScreenerSort, ScreenerSortField,
    StockSnapshot,
};
pub use sparkline::{from_series as sparkline_from_series, normalize, Sparkline, Trend};
pub use volume_profile::{
    calculate_volume_profile, PriceLevel, ProfileMode, VolumeProfile, VolumeProfileCalculator,
};
