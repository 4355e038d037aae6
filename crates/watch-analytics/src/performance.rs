//! 기간별 성과 (가격 변화율).
//!
//! 각 기간의 기준가는 기간 시작 시점 또는 그 이전의 마지막 종가입니다.
//! 예를 들어 YTD 기준가는 전년도 마지막 거래일 종가입니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use watch_core::PricePoint;

/// 성과 측정 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub enum PerformanceWindow {
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "YTD")]
    YearToDate,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "3Y")]
    ThreeYears,
    #[serde(rename = "5Y")]
    FiveYears,
}

impl PerformanceWindow {
    pub const ALL: [PerformanceWindow; 9] = [
        PerformanceWindow::OneDay,
        PerformanceWindow::OneWeek,
        PerformanceWindow::OneMonth,
        PerformanceWindow::ThreeMonths,
        PerformanceWindow::SixMonths,
        PerformanceWindow::YearToDate,
        PerformanceWindow::OneYear,
        PerformanceWindow::ThreeYears,
        PerformanceWindow::FiveYears,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceWindow::OneDay => "1D",
            PerformanceWindow::OneWeek => "1W",
            PerformanceWindow::OneMonth => "1M",
            PerformanceWindow::ThreeMonths => "3M",
            PerformanceWindow::SixMonths => "6M",
            PerformanceWindow::YearToDate => "YTD",
            PerformanceWindow::OneYear => "1Y",
            PerformanceWindow::ThreeYears => "3Y",
            PerformanceWindow::FiveYears => "5Y",
        }
    }

    /// `as_of` 기준 기간 시작 시각.
    pub fn start(&self, as_of: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let months = |n: u32| as_of.checked_sub_months(Months::new(n));
        match self {
            PerformanceWindow::OneDay => Some(as_of - Duration::days(1)),
            PerformanceWindow::OneWeek => Some(as_of - Duration::weeks(1)),
            PerformanceWindow::OneMonth => months(1),
            PerformanceWindow::ThreeMonths => months(3),
            PerformanceWindow::SixMonths => months(6),
            // 1월 1일 0시 직전 (전년도 마지막 종가가 기준가)
            PerformanceWindow::YearToDate => Utc
                .with_ymd_and_hms(as_of.year(), 1, 1, 0, 0, 0)
                .single()
                .map(|t| t - Duration::seconds(1)),
            PerformanceWindow::OneYear => months(12),
            PerformanceWindow::ThreeYears => months(36),
            PerformanceWindow::FiveYears => months(60),
        }
    }
}

impl fmt::Display for PerformanceWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PerformanceWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .iter()
            .find(|w| w.as_str() == upper)
            .copied()
            .ok_or_else(|| format!("unknown performance window: {}", s))
    }
}

/// 한 기간의 성과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct PerformanceDelta {
    pub window: PerformanceWindow,
    /// 기준가 시점
    pub start_time: DateTime<Utc>,
    pub start_price: Decimal,
    pub end_price: Decimal,
    pub change: Decimal,
    /// 변화율 (%, 소수점 2자리)
    pub change_pct: Decimal,
}

/// 벤치마크 대비 성과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct RelativePerformance {
    pub window: PerformanceWindow,
    pub stock_pct: Decimal,
    pub benchmark_pct: Decimal,
    /// stock_pct - benchmark_pct
    pub excess_pct: Decimal,
}

/// `time` 이전(포함) 마지막 데이터.
fn last_at_or_before(series: &[PricePoint], time: DateTime<Utc>) -> Option<&PricePoint> {
    let idx = series.partition_point(|p| p.time <= time);
    idx.checked_sub(1).map(|i| &series[i])
}

/// 모든 기간의 성과. 시계열이 기간 시작을 포함하지 않으면 해당 기간은 생략합니다.
pub fn performance_deltas(series: &[PricePoint], as_of: DateTime<Utc>) -> Vec<PerformanceDelta> {
    let Some(end) = last_at_or_before(series, as_of) else {
        return Vec::new();
    };

    PerformanceWindow::ALL
        .iter()
        .filter_map(|window| {
            let start_time = window.start(as_of)?;
            let start = last_at_or_before(series, start_time)?;
            if start.close <= Decimal::ZERO {
                return None;
            }
            let change = end.close - start.close;
            Some(PerformanceDelta {
                window: *window,
                start_time: start.time,
                start_price: start.close,
                end_price: end.close,
                change,
                change_pct: (change / start.close * dec!(100)).round_dp(2),
            })
        })
        .collect()
}

/// 두 종목이 모두 가진 기간에 대해 초과 성과를 계산합니다.
pub fn relative_performance(
    stock: &[PerformanceDelta],
    benchmark: &[PerformanceDelta],
) -> Vec<RelativePerformance> {
    stock
        .iter()
        .filter_map(|s| {
            let b = benchmark.iter().find(|b| b.window == s.window)?;
            Some(RelativePerformance {
                window: s.window,
                stock_pct: s.change_pct,
                benchmark_pct: b.change_pct,
                excess_pct: s.change_pct - b.change_pct,
            })
        })
        .collect()
}
