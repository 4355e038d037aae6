//! 한 종목의 파생 지표 묶음.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use watch_core::PricePoint;

use crate::drawdown::{current_drawdown, drawdown_series, max_drawdown, DrawdownPoint, MaxDrawdown};
use crate::fibonacci::{fibonacci_levels, FibonacciLevels};
use crate::performance::{performance_deltas, PerformanceDelta};
use crate::sparkline::{self, Sparkline};
use crate::volume_profile::{ProfileMode, VolumeProfile, VolumeProfileCalculator};

/// 계산 옵션.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsOptions {
    /// 볼륨 프로파일 구간 수
    pub profile_bins: usize,
    pub profile_mode: ProfileMode,
    pub value_area_ratio: Decimal,
    /// 스파크라인 점 개수
    pub sparkline_points: usize,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            profile_bins: 20,
            profile_mode: ProfileMode::Range,
            value_area_ratio: dec!(0.7),
            sparkline_points: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct StockMetrics {
    pub as_of: DateTime<Utc>,
    /// 사용한 데이터 수
    pub points: usize,
    pub last_close: Option<Decimal>,
    pub period_high: Option<Decimal>,
    pub period_low: Option<Decimal>,
    pub drawdown: Vec<DrawdownPoint>,
    pub max_drawdown: Option<MaxDrawdown>,
    pub current_drawdown_pct: Option<Decimal>,
    pub performance: Vec<PerformanceDelta>,
    pub sparkline: Option<Sparkline>,
    pub volume_profile: Option<VolumeProfile>,
    pub fibonacci: Option<FibonacciLevels>,
}

impl StockMetrics {
    /// `as_of` 이후 데이터는 무시합니다.
    pub fn compute(series: &[PricePoint], as_of: DateTime<Utc>, options: &MetricsOptions) -> Self {
        let end = series.partition_point(|p| p.time <= as_of);
        let series = &series[..end];

        let profile = VolumeProfileCalculator::new(options.profile_bins)
            .with_mode(options.profile_mode)
            .with_value_area_ratio(options.value_area_ratio)
            .calculate(series);

        Self {
            as_of,
            points: series.len(),
            last_close: series.last().map(|p| p.close),
            period_high: series.iter().map(|p| p.high).max(),
            period_low: series.iter().map(|p| p.low).min(),
            drawdown: drawdown_series(series),
            max_drawdown: max_drawdown(series),
            current_drawdown_pct: current_drawdown(series),
            performance: performance_deltas(series, as_of),
            sparkline: sparkline::from_series(series, options.sparkline_points),
            volume_profile: profile,
            fibonacci: fibonacci_levels(series),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn series(n: usize) -> Vec<PricePoint> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 21, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = Decimal::from(100 + (i % 17) as i64 - (i % 5) as i64);
                PricePoint::new(
                    base + Duration::days(i as i64),
                    close,
                    close + dec!(2),
                    close - dec!(2),
                    close,
                    Decimal::from(1000 + i as i64),
                )
            })
            .collect()
    }

    #[test]
    fn test_compute_bundle() {
        let points = series(120);
        let as_of = points.last().unwrap().time;
        let metrics = StockMetrics::compute(&points, as_of, &MetricsOptions::default());

        assert_eq!(metrics.points, 120);
        assert_eq!(metrics.drawdown.len(), 120);
        assert!(metrics.max_drawdown.is_some());
        assert_eq!(metrics.sparkline.as_ref().unwrap().points.len(), 50);
        assert_eq!(metrics.volume_profile.as_ref().unwrap().price_levels.len(), 20);
        assert!(metrics.fibonacci.is_some());
        assert!(!metrics.performance.is_empty());
    }

    #[test]
    fn test_points_after_as_of_ignored() {
        let points = series(30);
        let as_of = points[9].time;
        let metrics = StockMetrics::compute(&points, as_of, &MetricsOptions::default());

        assert_eq!(metrics.points, 10);
        assert_eq!(metrics.last_close, Some(points[9].close));
    }

    #[test]
    fn test_empty_series() {
        let metrics = StockMetrics::compute(&[], Utc::now(), &MetricsOptions::default());
        assert_eq!(metrics.points, 0);
        assert!(metrics.sparkline.is_none());
        assert!(metrics.volume_profile.is_none());
        assert!(metrics.performance.is_empty());
    }
}
