//! 시장 데이터 타입.
//!
//! - `Period` - 차트 조회 기간
//! - `PricePoint` - OHLCV 봉 데이터
//! - `Quote` - 현재 시세
//! - `SymbolMatch` - 종목 검색 결과

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::StockSymbol;
use crate::error::WatchError;

/// 차트 조회 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub enum Period {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "ytd")]
    YearToDate,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "max")]
    Max,
}

impl Period {
    pub const ALL: [Period; 10] = [
        Period::OneDay,
        Period::FiveDays,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::YearToDate,
        Period::OneYear,
        Period::TwoYears,
        Period::FiveYears,
        Period::Max,
    ];

    /// Yahoo range 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::FiveDays => "5d",
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::YearToDate => "ytd",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
            Period::Max => "max",
        }
    }

    /// 기간에 맞는 봉 간격.
    ///
    /// 하루/5일은 분봉, 2년까지는 일봉, 그 이상은 주봉을 사용합니다.
    pub fn interval(&self) -> &'static str {
        match self {
            Period::OneDay => "5m",
            Period::FiveDays => "15m",
            Period::FiveYears | Period::Max => "1wk",
            _ => "1d",
        }
    }

    /// 분봉 기간인지 여부.
    pub fn is_intraday(&self) -> bool {
        matches!(self, Period::OneDay | Period::FiveDays)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Period::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| WatchError::InvalidInput(format!("unknown period: {}", s)))
    }
}

/// OHLCV 봉 데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct PricePoint {
    /// 봉 시작 시각
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl PricePoint {
    pub fn new(
        time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 고가 - 저가.
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// 대표가 ((H + L + C) / 3).
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }
}

/// 현재 시세.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct Quote {
    pub symbol: StockSymbol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 현재가
    pub price: Decimal,
    /// 전일 종가
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<Decimal>,
    /// 전일 대비 변동
    pub change: Decimal,
    /// 전일 대비 변동률 (%)
    pub change_pct: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_high: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_low: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    /// 조회 시각
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    /// 현재가와 전일 종가만으로 시세를 생성합니다.
    pub fn new(symbol: StockSymbol, price: Decimal, previous_close: Option<Decimal>) -> Self {
        let (change, change_pct) = Self::compute_change(price, previous_close);
        Self {
            symbol,
            name: None,
            price,
            previous_close,
            change,
            change_pct,
            open: None,
            day_high: None,
            day_low: None,
            volume: None,
            market_cap: None,
            currency: None,
            exchange: None,
            fetched_at: Utc::now(),
        }
    }

    /// 전일 대비 변동과 변동률(%)을 계산합니다.
    ///
    /// 전일 종가가 없거나 0이면 둘 다 0입니다. 변동률은 소수 넷째 자리에서 반올림합니다.
    pub fn compute_change(price: Decimal, previous_close: Option<Decimal>) -> (Decimal, Decimal) {
        match previous_close {
            Some(prev) if !prev.is_zero() => {
                let change = price - prev;
                let pct = (change / prev * Decimal::ONE_HUNDRED).round_dp(4);
                (change, pct)
            }
            _ => (Decimal::ZERO, Decimal::ZERO),
        }
    }
}

/// 종목 검색 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    /// EQUITY, ETF, INDEX 등
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_type: Option<String>,
}
