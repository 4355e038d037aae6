//! 낙폭 (Drawdown) 계산.
//!
//! 각 시점의 종가가 그때까지의 최고 종가 대비 몇 % 아래에 있는지 계산합니다.
//! 낙폭은 항상 0 이하이며, 새 고점에서는 0입니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use watch_core::PricePoint;

/// 낙폭 시계열의 한 점.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct DrawdownPoint {
    pub time: DateTime<Utc>,
    pub close: Decimal,
    /// 해당 시점까지의 최고 종가
    pub peak: Decimal,
    /// (close - peak) / peak × 100 (≤ 0)
    pub drawdown_pct: Decimal,
}

/// 최대 낙폭 구간.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct MaxDrawdown {
    /// 최대 낙폭 (%, ≤ 0)
    pub drawdown_pct: Decimal,
    pub peak_time: DateTime<Utc>,
    pub peak_price: Decimal,
    pub trough_time: DateTime<Utc>,
    pub trough_price: Decimal,
    /// 고점 회복 시점 (아직 회복하지 못했으면 None)
    pub recovery_time: Option<DateTime<Utc>>,
}

fn pct_below_peak(close: Decimal, peak: Decimal) -> Decimal {
    if peak <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((close - peak) / peak * dec!(100)).round_dp(4)
}

/// 종가 기준 낙폭 시계열.
pub fn drawdown_series(series: &[PricePoint]) -> Vec<DrawdownPoint> {
    let mut peak = Decimal::MIN;

    series
        .iter()
        .map(|p| {
            if p.close > peak {
                peak = p.close;
            }
            DrawdownPoint {
                time: p.time,
                close: p.close,
                peak,
                drawdown_pct: pct_below_peak(p.close, peak),
            }
        })
        .collect()
}

/// 최대 낙폭과 해당 고점/저점/회복 시점.
///
/// 하락이 한 번도 없으면 낙폭 0, 고점과 저점은 첫 데이터입니다.
pub fn max_drawdown(series: &[PricePoint]) -> Option<MaxDrawdown> {
    let first = series.first()?;

    let mut peak = (first.time, first.close);
    let mut worst = MaxDrawdown {
        drawdown_pct: Decimal::ZERO,
        peak_time: first.time,
        peak_price: first.close,
        trough_time: first.time,
        trough_price: first.close,
        recovery_time: None,
    };
    let mut trough_index = 0;

    for (i, p) in series.iter().enumerate() {
        if p.close > peak.1 {
            peak = (p.time, p.close);
        }
        let dd = pct_below_peak(p.close, peak.1);
        if dd < worst.drawdown_pct {
            worst.drawdown_pct = dd;
            worst.peak_time = peak.0;
            worst.peak_price = peak.1;
            worst.trough_time = p.time;
            worst.trough_price = p.close;
            trough_index = i;
        }
    }

    if worst.drawdown_pct < Decimal::ZERO {
        worst.recovery_time = series[trough_index + 1..]
            .iter()
            .find(|p| p.close >= worst.peak_price)
            .map(|p| p.time);
    }

    Some(worst)
}

/// 마지막 시점의 낙폭 (%).
pub fn current_drawdown(series: &[PricePoint]) -> Option<Decimal> {
    let peak = series.iter().map(|p| p.close).max()?;
    let last = series.last()?;
    Some(pct_below_peak(last.close, peak))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn series(closes: &[Decimal]) -> Vec<PricePoint> {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                PricePoint::new(base + Duration::days(i as i64), *c, *c, *c, *c, dec!(1000))
            })
            .collect()
    }

    #[test]
    fn test_drawdown_series() {
        let points = series(&[dec!(100), dec!(110), dec!(99), dec!(121), dec!(110)]);
        let dd = drawdown_series(&points);

        assert_eq!(dd[0].drawdown_pct, Decimal::ZERO);
        assert_eq!(dd[1].drawdown_pct, Decimal::ZERO);
        assert_eq!(dd[2].drawdown_pct, dec!(-10));
        assert_eq!(dd[2].peak, dec!(110));
        assert_eq!(dd[3].drawdown_pct, Decimal::ZERO);
        assert_eq!(dd[4].peak, dec!(121));
    }

    #[test]
    fn test_max_drawdown_with_recovery() {
        let points = series(&[dec!(100), dec!(120), dec!(90), dec!(100), dec!(125), dec!(110)]);
        let max = max_drawdown(&points).unwrap();

        assert_eq!(max.drawdown_pct, dec!(-25));
        assert_eq!(max.peak_price, dec!(120));
        assert_eq!(max.trough_price, dec!(90));
        assert_eq!(max.peak_time, points[1].time);
        assert_eq!(max.trough_time, points[2].time);
        assert_eq!(max.recovery_time, Some(points[4].time));
    }

    #[test]
    fn test_max_drawdown_unrecovered() {
        let points = series(&[dec!(50), dec!(40), dec!(45)]);
        let max = max_drawdown(&points).unwrap();
        assert_eq!(max.drawdown_pct, dec!(-20));
        assert!(max.recovery_time.is_none());
    }

    #[test]
    fn test_monotonic_rise_has_no_drawdown() {
        let points = series(&[dec!(1), dec!(2), dec!(3)]);
        let max = max_drawdown(&points).unwrap();
        assert_eq!(max.drawdown_pct, Decimal::ZERO);
        assert_eq!(current_drawdown(&points), Some(Decimal::ZERO));
    }

    #[test]
    fn test_empty_series() {
        assert!(drawdown_series(&[]).is_empty());
        assert!(max_drawdown(&[]).is_none());
        assert!(current_drawdown(&[]).is_none());
    }

    proptest! {
        #[test]
        fn prop_drawdown_never_positive(closes in prop::collection::vec(1u32..10_000, 1..200)) {
            let closes: Vec<Decimal> = closes.into_iter().map(Decimal::from).collect();
            let points = series(&closes);
            let dd = drawdown_series(&points);

            for point in &dd {
                prop_assert!(point.drawdown_pct <= Decimal::ZERO);
                prop_assert!(point.close <= point.peak);
                if point.close == point.peak {
                    prop_assert_eq!(point.drawdown_pct, Decimal::ZERO);
                }
            }

            let max = max_drawdown(&points).unwrap();
            let min_dd = dd.iter().map(|p| p.drawdown_pct).min().unwrap();
            prop_assert_eq!(max.drawdown_pct, min_dd);
        }
    }
}
