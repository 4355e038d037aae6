//! 스파크라인 정규화.
//!
//! 시계열을 지정한 점 개수로 줄이고 0~1 범위로 정규화합니다.
//! 구간 평균으로 다운샘플링하며 마지막 점은 항상 실제 마지막 값입니다.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use watch_core::PricePoint;

/// 최소 점 개수.
const MIN_POINTS: usize = 2;

/// 추세 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct Sparkline {
    /// 0.0 ~ 1.0
    pub points: Vec<f64>,
    pub min: Decimal,
    pub max: Decimal,
    pub trend: Trend,
    /// 첫 값 대비 마지막 값 변화율 (%)
    pub change_pct: Decimal,
}

/// 구간 평균 다운샘플링.
fn downsample(values: &[Decimal], target: usize) -> Vec<Decimal> {
    if values.len() <= target {
        return values.to_vec();
    }

    let n = values.len();
    let mut out: Vec<Decimal> = (0..target)
        .map(|i| {
            let start = i * n / target;
            let end = ((i + 1) * n / target).max(start + 1);
            let bucket = &values[start..end];
            bucket.iter().sum::<Decimal>() / Decimal::from(bucket.len())
        })
        .collect();

    if let (Some(last_out), Some(last)) = (out.last_mut(), values.last()) {
        *last_out = *last;
    }
    out
}

/// 값 목록을 정규화합니다. 값이 없으면 `None`.
///
/// 모든 값이 같으면 모든 점이 0.5입니다.
pub fn normalize(values: &[Decimal], target_points: usize) -> Option<Sparkline> {
    let first = *values.first()?;
    let last = *values.last()?;
    let min = values.iter().copied().min()?;
    let max = values.iter().copied().max()?;

    let sampled = downsample(values, target_points.max(MIN_POINTS));
    let range = max - min;

    let points = sampled
        .iter()
        .map(|v| {
            if range.is_zero() {
                0.5
            } else {
                ((*v - min) / range).to_f64().unwrap_or(0.5).clamp(0.0, 1.0)
            }
        })
        .collect();

    let trend = match last.cmp(&first) {
        std::cmp::Ordering::Greater => Trend::Up,
        std::cmp::Ordering::Less => Trend::Down,
        std::cmp::Ordering::Equal => Trend::Flat,
    };

    let change_pct = if first.is_zero() {
        Decimal::ZERO
    } else {
        ((last - first) / first * dec!(100)).round_dp(2)
    };

    Some(Sparkline {
        points,
        min,
        max,
        trend,
        change_pct,
    })
}

/// 종가 시계열의 스파크라인.
pub fn from_series(series: &[PricePoint], target_points: usize) -> Option<Sparkline> {
    let closes: Vec<Decimal> = series.iter().map(|p| p.close).collect();
    normalize(&closes, target_points)
}
