//! 종목 스크리너.
//!
//! 시세와 확장 데이터 스냅샷에 필터/정렬을 적용합니다. 필터에 지정한 값이
//! 스냅샷에 없으면 (예: PER 미제공) 해당 종목은 제외됩니다.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use watch_core::Quote;
use watch_data::ExtendedData;

/// 스크리닝 대상 스냅샷.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct StockSnapshot {
    pub quote: Quote,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedData>,
    /// 애널리스트 컨센서스 점수 (1 = Strong Buy ~ 5 = Strong Sell)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus_score: Option<Decimal>,
}

impl StockSnapshot {
    pub fn new(quote: Quote) -> Self {
        Self {
            quote,
            extended: None,
            consensus_score: None,
        }
    }

    pub fn market_cap(&self) -> Option<Decimal> {
        self.quote
            .market_cap
            .or_else(|| self.extended.as_ref().and_then(|e| e.market_cap))
    }

    pub fn pe(&self) -> Option<Decimal> {
        self.extended.as_ref().and_then(|e| e.trailing_pe)
    }

    pub fn dividend_yield(&self) -> Option<Decimal> {
        self.extended.as_ref().and_then(|e| e.dividend_yield)
    }

    fn sector(&self) -> Option<&str> {
        self.extended.as_ref().and_then(|e| e.sector.as_deref())
    }

    fn industry(&self) -> Option<&str> {
        self.extended.as_ref().and_then(|e| e.industry.as_deref())
    }

    fn sort_value(&self, field: ScreenerSortField) -> Option<Decimal> {
        match field {
            ScreenerSortField::Symbol => None,
            ScreenerSortField::Price => Some(self.quote.price),
            ScreenerSortField::ChangePct => Some(self.quote.change_pct),
            ScreenerSortField::MarketCap => self.market_cap(),
            ScreenerSortField::Pe => self.pe(),
            ScreenerSortField::DividendYield => self.dividend_yield(),
            ScreenerSortField::Volume => self.quote.volume,
        }
    }
}

/// 스크리너 필터. 지정하지 않은 조건은 무시합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct ScreenerFilter {
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_market_cap: Option<Decimal>,
    pub max_market_cap: Option<Decimal>,
    pub min_pe: Option<Decimal>,
    pub max_pe: Option<Decimal>,
    /// 배당수익률 (%)
    pub min_dividend_yield: Option<Decimal>,
    pub max_dividend_yield: Option<Decimal>,
    pub min_change_pct: Option<Decimal>,
    pub max_change_pct: Option<Decimal>,
    pub min_volume: Option<Decimal>,
    /// 대소문자 무시 부분 일치
    pub sector: Option<String>,
    pub industry: Option<String>,
    /// 컨센서스 점수 상한 (낮을수록 매수 의견, 2.0 = Buy 이상)
    pub max_consensus_score: Option<Decimal>,
}

fn within(value: Option<Decimal>, min: Option<Decimal>, max: Option<Decimal>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(v) = value else {
        return false;
    };
    min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m)
}

fn contains_ci(value: Option<&str>, needle: &Option<String>) -> bool {
    match needle {
        None => true,
        Some(n) => value.is_some_and(|v| v.to_lowercase().contains(&n.to_lowercase())),
    }
}

impl ScreenerFilter {
    /// 확장 데이터가 필요한 조건이 있는지.
    pub fn needs_extended(&self) -> bool {
        self.min_pe.is_some()
            || self.max_pe.is_some()
            || self.min_dividend_yield.is_some()
            || self.max_dividend_yield.is_some()
            || self.sector.is_some()
            || self.industry.is_some()
            || self.min_market_cap.is_some()
            || self.max_market_cap.is_some()
    }

    pub fn needs_analyst(&self) -> bool {
        self.max_consensus_score.is_some()
    }

    pub fn matches(&self, s: &StockSnapshot) -> bool {
        within(Some(s.quote.price), self.min_price, self.max_price)
            && within(s.market_cap(), self.min_market_cap, self.max_market_cap)
            && within(s.pe(), self.min_pe, self.max_pe)
            && within(s.dividend_yield(), self.min_dividend_yield, self.max_dividend_yield)
            && within(Some(s.quote.change_pct), self.min_change_pct, self.max_change_pct)
            && within(s.quote.volume, self.min_volume, None)
            && within(s.consensus_score, None, self.max_consensus_score)
            && contains_ci(s.sector(), &self.sector)
            && contains_ci(s.industry(), &self.industry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ScreenerSortField {
    #[default]
    Symbol,
    Price,
    ChangePct,
    MarketCap,
    Pe,
    DividendYield,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ScreenerSort {
    pub field: ScreenerSortField,
    #[serde(default)]
    pub descending: bool,
}

impl ScreenerSort {
    pub fn desc(field: ScreenerSortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    pub fn asc(field: ScreenerSortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    /// 값이 없는 종목은 방향과 무관하게 뒤로 보냅니다.
    fn compare(&self, a: &StockSnapshot, b: &StockSnapshot) -> Ordering {
        if self.field == ScreenerSortField::Symbol {
            let ord = a.quote.symbol.cmp(&b.quote.symbol);
            return if self.descending { ord.reverse() } else { ord };
        }

        match (a.sort_value(self.field), b.sort_value(self.field)) {
            (Some(x), Some(y)) => {
                let ord = x.cmp(&y);
                if self.descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.quote.symbol.cmp(&b.quote.symbol),
        }
    }
}

/// 필터 → 정렬 → 개수 제한.
pub fn screen(
    snapshots: Vec<StockSnapshot>,
    filter: &ScreenerFilter,
    sort: Option<&ScreenerSort>,
    limit: Option<usize>,
) -> Vec<StockSnapshot> {
    let mut matched: Vec<StockSnapshot> = snapshots
        .into_iter()
        .filter(|s| filter.matches(s))
        .collect();

    if let Some(sort) = sort {
        matched.sort_by(|a, b| sort.compare(a, b));
    }
    if let Some(limit) = limit {
        matched.truncate(limit);
    }
    matched
}

/// 미리 정의된 스크리너.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ScreenerPreset {
    pub name: String,
    pub description: String,
    pub filter: ScreenerFilter,
    pub sort: ScreenerSort,
}

pub fn presets() -> Vec<ScreenerPreset> {
    vec![
        ScreenerPreset {
            name: "value".to_string(),
            description: "저PER 가치주 (0 < PER ≤ 15, 시가총액 10억 달러 이상)".to_string(),
            filter: ScreenerFilter {
                min_pe: Some(dec!(0.01)),
                max_pe: Some(dec!(15)),
                min_market_cap: Some(dec!(1000000000)),
                ..Default::default()
            },
            sort: ScreenerSort::asc(ScreenerSortField::Pe),
        },
        ScreenerPreset {
            name: "dividend".to_string(),
            description: "고배당주 (배당수익률 3% 이상)".to_string(),
            filter: ScreenerFilter {
                min_dividend_yield: Some(dec!(3)),
                ..Default::default()
            },
            sort: ScreenerSort::desc(ScreenerSortField::DividendYield),
        },
        ScreenerPreset {
            name: "momentum".to_string(),
            description: "당일 2% 이상 상승".to_string(),
            filter: ScreenerFilter {
                min_change_pct: Some(dec!(2)),
                ..Default::default()
            },
            sort: ScreenerSort::desc(ScreenerSortField::ChangePct),
        },
        ScreenerPreset {
            name: "large_cap".to_string(),
            description: "대형주 (시가총액 100억 달러 이상)".to_string(),
            filter: ScreenerFilter {
                min_market_cap: Some(dec!(10000000000)),
                ..Default::default()
            },
            sort: ScreenerSort::desc(ScreenerSortField::MarketCap),
        },
    ]
}

pub fn preset(name: &str) -> Option<ScreenerPreset> {
    let name = name.trim().to_lowercase().replace('-', "_");
    presets().into_iter().find(|p| p.name == name)
}
