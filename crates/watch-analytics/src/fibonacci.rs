//! 피보나치 되돌림/확장 레벨.
//!
//! 시계열의 최고가와 최저가를 스윙 고점/저점으로 사용합니다. 저점이 고점보다
//! 먼저 나왔으면 상승 스윙으로 보고 고점에서 아래로 되돌림을 측정하며,
//! 하락 스윙이면 저점에서 위로 측정합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use watch_core::PricePoint;

pub const RETRACEMENT_RATIOS: [Decimal; 7] = [
    dec!(0),
    dec!(0.236),
    dec!(0.382),
    dec!(0.5),
    dec!(0.618),
    dec!(0.786),
    dec!(1),
];

pub const EXTENSION_RATIOS: [Decimal; 3] = [dec!(1.272), dec!(1.618), dec!(2.618)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SwingDirection {
    /// 저점 → 고점
    Up,
    /// 고점 → 저점
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct FibLevel {
    pub ratio: Decimal,
    pub price: Decimal,
    /// "61.8%" 형식
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct FibonacciLevels {
    pub swing_high: Decimal,
    pub swing_high_time: DateTime<Utc>,
    pub swing_low: Decimal,
    pub swing_low_time: DateTime<Utc>,
    pub direction: SwingDirection,
    pub retracements: Vec<FibLevel>,
    pub extensions: Vec<FibLevel>,
}

impl FibonacciLevels {
    /// 현재가에 가장 가까운 되돌림 레벨.
    pub fn nearest_retracement(&self, price: Decimal) -> Option<&FibLevel> {
        self.retracements
            .iter()
            .min_by_key(|l| (l.price - price).abs())
    }
}

fn level(ratio: Decimal, price: Decimal) -> FibLevel {
    FibLevel {
        ratio,
        price: price.round_dp(4),
        label: format!("{}%", (ratio * dec!(100)).normalize()),
    }
}

/// 시계열의 피보나치 레벨. 고가와 저가가 같으면 `None`.
pub fn fibonacci_levels(series: &[PricePoint]) -> Option<FibonacciLevels> {
    let high = series.iter().max_by_key(|p| p.high)?;
    let low = series.iter().min_by_key(|p| p.low)?;
    let range = high.high - low.low;
    if range <= Decimal::ZERO {
        return None;
    }

    let direction = if low.time <= high.time {
        SwingDirection::Up
    } else {
        SwingDirection::Down
    };

    let (retracements, extensions) = match direction {
        SwingDirection::Up => (
            RETRACEMENT_RATIOS
                .iter()
                .map(|r| level(*r, high.high - range * r))
                .collect(),
            EXTENSION_RATIOS
                .iter()
                .map(|r| level(*r, low.low + range * r))
                .collect(),
        ),
        SwingDirection::Down => (
            RETRACEMENT_RATIOS
                .iter()
                .map(|r| level(*r, low.low + range * r))
                .collect(),
            EXTENSION_RATIOS
                .iter()
                .map(|r| level(*r, high.high - range * r))
                .collect(),
        ),
    };

    Some(FibonacciLevels {
        swing_high: high.high,
        swing_high_time: high.time,
        swing_low: low.low,
        swing_low_time: low.time,
        direction,
        retracements,
        extensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bars(prices: &[(Decimal, Decimal)]) -> Vec<PricePoint> {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, (high, low))| {
                PricePoint::new(base + Duration::days(i as i64), *low, *high, *low, *high, dec!(10))
            })
            .collect()
    }

    #[test]
    fn test_uptrend_retracements_from_high() {
        let fib = fibonacci_levels(&bars(&[
            (dec!(105), dec!(100)),
            (dec!(150), dec!(120)),
            (dec!(200), dec!(180)),
        ]))
        .unwrap();

        assert_eq!(fib.direction, SwingDirection::Up);
        assert_eq!(fib.retracements[0].price, dec!(200));
        assert_eq!(fib.retracements[3].price, dec!(150));
        assert_eq!(fib.retracements[6].price, dec!(100));
        assert_eq!(fib.retracements[4].label, "61.8%");
        assert_eq!(fib.extensions[1].price, dec!(261.8));
    }

    #[test]
    fn test_downtrend_retracements_from_low() {
        let fib = fibonacci_levels(&bars(&[
            (dec!(200), dec!(190)),
            (dec!(150), dec!(140)),
            (dec!(110), dec!(100)),
        ]))
        .unwrap();

        assert_eq!(fib.direction, SwingDirection::Down);
        assert_eq!(fib.retracements[0].price, dec!(100));
        assert_eq!(fib.retracements[6].price, dec!(200));
        assert_eq!(fib.retracements[2].price, dec!(138.2));
        assert_eq!(fib.extensions[0].price, dec!(72.8));
    }

    #[test]
    fn test_nearest_retracement() {
        let fib = fibonacci_levels(&bars(&[(dec!(10), dec!(0)), (dec!(100), dec!(90))])).unwrap();
        let nearest = fib.nearest_retracement(dec!(52)).unwrap();
        assert_eq!(nearest.ratio, dec!(0.5));
    }

    #[test]
    fn test_flat_series() {
        assert!(fibonacci_levels(&bars(&[(dec!(5), dec!(5)), (dec!(5), dec!(5))])).is_none());
        assert!(fibonacci_levels(&[]).is_none());
    }
}
