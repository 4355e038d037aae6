//! 볼륨 프로파일 (매물대) 계산.
//!
//! 가격 시계열에서 가격대별 거래량을 집계합니다.
//!
//! # 주요 지표
//!
//! - **POC (Point of Control)**: 최대 거래량이 집중된 가격대
//! - **Value Area (VA)**: 전체 거래량의 70%가 집중된 가격 범위
//! - **VAH/VAL**: Value Area High/Low
//!
//! # 예시
//!
//! ```rust,ignore
//! use watch_analytics::volume_profile::VolumeProfileCalculator;
//!
//! let calculator = VolumeProfileCalculator::new(20); // 20개 가격 구간
//! let profile = calculator.calculate(&points);
//! println!("POC: {}", profile.poc);
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use watch_core::PricePoint;

/// 거래량 분배 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ProfileMode {
    /// 봉의 고가~저가 범위에 걸친 구간에 균등 분배
    #[default]
    Range,
    /// 종가가 속한 구간에 전량 배정
    Close,
}

/// 가격 구간별 거래량.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct PriceLevel {
    pub price_low: Decimal,
    pub price_high: Decimal,
    /// 구간 중심 가격
    pub price: Decimal,
    pub volume: Decimal,
    /// 전체 거래량 대비 비율 (%)
    pub volume_pct: Decimal,
}

/// 볼륨 프로파일 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct VolumeProfile {
    pub mode: ProfileMode,
    /// 가격 오름차순
    pub price_levels: Vec<PriceLevel>,
    /// 최대 거래량 구간의 중심 가격
    pub poc: Decimal,
    pub poc_index: usize,
    pub value_area_high: Decimal,
    pub value_area_low: Decimal,
    pub value_area_ratio: Decimal,
    pub total_volume: Decimal,
    pub price_low: Decimal,
    pub price_high: Decimal,
    /// 분석 봉 수
    pub period: usize,
}

/// 볼륨 프로파일 계산기.
#[derive(Debug, Clone)]
pub struct VolumeProfileCalculator {
    /// 가격 구간 수 (5~100)
    num_levels: usize,
    /// Value Area 비율 (기본 0.7)
    value_area_ratio: Decimal,
    mode: ProfileMode,
}

impl Default for VolumeProfileCalculator {
    fn default() -> Self {
        Self::new(20)
    }
}

impl VolumeProfileCalculator {
    /// * `num_levels` - 가격 구간 수 (5~100으로 제한)
    pub fn new(num_levels: usize) -> Self {
        Self {
            num_levels: num_levels.clamp(5, 100),
            value_area_ratio: dec!(0.70),
            mode: ProfileMode::Range,
        }
    }

    /// Value Area 비율 설정 (0.5~0.9로 제한).
    pub fn with_value_area_ratio(mut self, ratio: Decimal) -> Self {
        self.value_area_ratio = ratio.max(dec!(0.5)).min(dec!(0.9));
        self
    }

    pub fn with_mode(mut self, mode: ProfileMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// 볼륨 프로파일 계산. 봉이 2개 미만이거나 가격 범위/거래량이 없으면 `None`.
    pub fn calculate(&self, points: &[PricePoint]) -> Option<VolumeProfile> {
        if points.len() < 2 {
            return None;
        }

        let price_low = points.iter().map(|p| p.low).min()?;
        let price_high = points.iter().map(|p| p.high).max()?;
        if price_high <= price_low {
            return None;
        }

        let level_size = (price_high - price_low) / Decimal::from(self.num_levels);
        if level_size <= Decimal::ZERO {
            return None;
        }

        let mut levels = vec![Decimal::ZERO; self.num_levels];
        let mut total_volume = Decimal::ZERO;

        for point in points {
            if point.volume <= Decimal::ZERO {
                continue;
            }
            self.distribute_volume(point, price_low, level_size, &mut levels);
            total_volume += point.volume;
        }

        if total_volume <= Decimal::ZERO {
            return None;
        }

        let price_levels: Vec<PriceLevel> = levels
            .iter()
            .enumerate()
            .map(|(i, &vol)| {
                let low = price_low + level_size * Decimal::from(i);
                PriceLevel {
                    price_low: low,
                    price_high: low + level_size,
                    price: low + level_size / dec!(2),
                    volume: vol,
                    volume_pct: (vol / total_volume * dec!(100)).round_dp(2),
                }
            })
            .collect();

        let (poc_index, poc) = find_poc(&price_levels);
        let (value_area_low, value_area_high) =
            self.value_area(&price_levels, poc_index, total_volume);

        Some(VolumeProfile {
            mode: self.mode,
            price_levels,
            poc,
            poc_index,
            value_area_high,
            value_area_low,
            value_area_ratio: self.value_area_ratio,
            total_volume,
            price_low,
            price_high,
            period: points.len(),
        })
    }

    /// 가격이 속한 구간 인덱스. 최고가는 마지막 구간에 포함됩니다.
    fn level_index(&self, price: Decimal, price_low: Decimal, level_size: Decimal) -> usize {
        ((price - price_low) / level_size)
            .floor()
            .to_usize()
            .unwrap_or(0)
            .min(self.num_levels - 1)
    }

    fn distribute_volume(
        &self,
        point: &PricePoint,
        price_low: Decimal,
        level_size: Decimal,
        levels: &mut [Decimal],
    ) {
        // 고가=저가인 봉은 범위 분배가 불가능하므로 종가 구간에 배정
        if self.mode == ProfileMode::Close || point.high <= point.low {
            let idx = self.level_index(point.close, price_low, level_size);
            levels[idx] += point.volume;
            return;
        }

        let start = self.level_index(point.low, price_low, level_size);
        let end = self.level_index(point.high, price_low, level_size);
        let covered = end - start + 1;
        let per_level = point.volume / Decimal::from(covered);

        for level in &mut levels[start..=end] {
            *level += per_level;
        }
    }

    /// POC에서 거래량이 큰 쪽으로 확장하여 목표 비율을 채웁니다.
    fn value_area(
        &self,
        levels: &[PriceLevel],
        poc_index: usize,
        total_volume: Decimal,
    ) -> (Decimal, Decimal) {
        if levels.is_empty() {
            return (Decimal::ZERO, Decimal::ZERO);
        }

        let target_volume = total_volume * self.value_area_ratio;
        let last = levels.len() - 1;
        let mut included = levels[poc_index].volume;
        let mut low_index = poc_index;
        let mut high_index = poc_index;

        while included < target_volume && (low_index > 0 || high_index < last) {
            let next_low = if low_index > 0 {
                levels[low_index - 1].volume
            } else {
                Decimal::ZERO
            };
            let next_high = if high_index < last {
                levels[high_index + 1].volume
            } else {
                Decimal::ZERO
            };

            if low_index > 0 && (next_low >= next_high || high_index == last) {
                low_index -= 1;
                included += levels[low_index].volume;
            } else {
                high_index += 1;
                included += levels[high_index].volume;
            }
        }

        (levels[low_index].price, levels[high_index].price)
    }
}

fn find_poc(levels: &[PriceLevel]) -> (usize, Decimal) {
    let mut max_vol = Decimal::ZERO;
    let mut poc_index = 0;

    for (i, level) in levels.iter().enumerate() {
        if level.volume > max_vol {
            max_vol = level.volume;
            poc_index = i;
        }
    }

    (
        poc_index,
        levels.get(poc_index).map(|l| l.price).unwrap_or(Decimal::ZERO),
    )
}

/// 간편 함수: 기본 설정(Range 모드, 70%)으로 계산.
pub fn calculate_volume_profile(points: &[PricePoint], num_levels: usize) -> Option<VolumeProfile> {
    VolumeProfileCalculator::new(num_levels).calculate(points)
}
