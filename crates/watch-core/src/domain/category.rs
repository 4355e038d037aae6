//! 확장 데이터 캐시 카테고리.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WatchError;

/// 독립적으로 만료되는 확장 데이터 카테고리.
///
/// | 카테고리 | 기본 TTL |
/// |---|---|
/// | extended | 1시간 |
/// | dividends_splits | 24시간 |
/// | calendar | 6시간 |
/// | analyst | 4시간 |
/// | holders | 12시간 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    /// 밸류에이션, 수익성 등 기본 지표
    Extended,
    /// 배당 및 분할 이력
    DividendsSplits,
    /// 실적 발표 및 배당 일정
    Calendar,
    /// 애널리스트 추천 및 목표가
    Analyst,
    /// 내부자/기관 보유 현황
    Holders,
}

impl DataCategory {
    pub const ALL: [DataCategory; 5] = [
        DataCategory::Extended,
        DataCategory::DividendsSplits,
        DataCategory::Calendar,
        DataCategory::Analyst,
        DataCategory::Holders,
    ];

    /// 저장소 키로 쓰이는 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::Extended => "extended",
            DataCategory::DividendsSplits => "dividends_splits",
            DataCategory::Calendar => "calendar",
            DataCategory::Analyst => "analyst",
            DataCategory::Holders => "holders",
        }
    }

    pub fn default_ttl(&self) -> Duration {
        match self {
            DataCategory::Extended => Duration::hours(1),
            DataCategory::DividendsSplits => Duration::hours(24),
            DataCategory::Calendar => Duration::hours(6),
            DataCategory::Analyst => Duration::hours(4),
            DataCategory::Holders => Duration::hours(12),
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataCategory {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "extended" => Ok(DataCategory::Extended),
            "dividends_splits" | "dividends" | "splits" => Ok(DataCategory::DividendsSplits),
            "calendar" => Ok(DataCategory::Calendar),
            "analyst" => Ok(DataCategory::Analyst),
            "holders" => Ok(DataCategory::Holders),
            other => Err(WatchError::InvalidInput(format!(
                "unknown data category: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for category in DataCategory::ALL {
            assert_eq!(category.as_str().parse::<DataCategory>().unwrap(), category);
        }
        assert_eq!(
            "dividends".parse::<DataCategory>().unwrap(),
            DataCategory::DividendsSplits
        );
        assert!("news".parse::<DataCategory>().is_err());
    }

    #[test]
    fn test_default_ttls() {
        assert_eq!(DataCategory::Extended.default_ttl().num_hours(), 1);
        assert_eq!(DataCategory::DividendsSplits.default_ttl().num_hours(), 24);
        assert_eq!(DataCategory::Calendar.default_ttl().num_hours(), 6);
        assert_eq!(DataCategory::Analyst.default_ttl().num_hours(), 4);
        assert_eq!(DataCategory::Holders.default_ttl().num_hours(), 12);
    }
}
