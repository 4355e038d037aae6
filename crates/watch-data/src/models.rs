//! 카테고리별 확장 데이터 페이로드.
//!
//! 캐시에는 JSON으로 저장되며, 각 타입은 하나의 [`DataCategory`]에 대응합니다.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use watch_core::DataCategory;

/// 캐시 가능한 카테고리 페이로드.
pub trait CategoryPayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    const CATEGORY: DataCategory;
}

/// 밸류에이션/수익성 등 기본 지표 (TTL 1시간).
///
/// 퍼센트 필드는 모두 % 단위입니다 (0.25가 아닌 25.0).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ExtendedData {
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<Decimal>,
    pub shares_outstanding: Option<i64>,

    // 밸류에이션
    pub trailing_pe: Option<Decimal>,
    pub forward_pe: Option<Decimal>,
    pub price_to_book: Option<Decimal>,
    pub eps: Option<Decimal>,
    pub book_value: Option<Decimal>,

    // 배당
    pub dividend_yield: Option<Decimal>,
    pub payout_ratio: Option<Decimal>,

    // 가격 통계 (1년 일봉 기준)
    pub week_52_high: Option<Decimal>,
    pub week_52_low: Option<Decimal>,
    pub avg_volume_10d: Option<i64>,
    pub avg_volume_3m: Option<i64>,

    // 수익성/성장성
    pub roe: Option<Decimal>,
    pub profit_margin: Option<Decimal>,
    pub operating_margin: Option<Decimal>,
    pub revenue_growth: Option<Decimal>,
    pub earnings_growth: Option<Decimal>,
    pub debt_to_equity: Option<Decimal>,

    pub currency: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl CategoryPayload for ExtendedData {
    const CATEGORY: DataCategory = DataCategory::Extended;
}

/// 배당 지급 이벤트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct DividendEvent {
    pub date: DateTime<Utc>,
    pub amount: Decimal,
}

/// 주식 분할 이벤트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct SplitEvent {
    pub date: DateTime<Utc>,
    pub numerator: Decimal,
    pub denominator: Decimal,
    /// "4:1" 형식
    pub ratio: String,
}

/// 배당/분할 이력 (TTL 24시간). 최신순 정렬.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct DividendsSplits {
    pub dividends: Vec<DividendEvent>,
    pub splits: Vec<SplitEvent>,
}

impl CategoryPayload for DividendsSplits {
    const CATEGORY: DataCategory = DataCategory::DividendsSplits;
}

impl DividendsSplits {
    /// 최신순으로 정렬합니다.
    pub fn sort_newest_first(&mut self) {
        self.dividends.sort_by(|a, b| b.date.cmp(&a.date));
        self.splits.sort_by(|a, b| b.date.cmp(&a.date));
    }

    /// `as_of` 이전 365일 동안의 배당 합계.
    pub fn trailing_annual_dividend(&self, as_of: DateTime<Utc>) -> Decimal {
        let start = as_of - Duration::days(365);
        self.dividends
            .iter()
            .filter(|d| d.date > start && d.date <= as_of)
            .map(|d| d.amount)
            .sum()
    }

    /// `as_of` 이후 누적 분할 배수 (분할 조정 계수).
    pub fn split_factor_since(&self, since: DateTime<Utc>) -> Decimal {
        self.splits
            .iter()
            .filter(|s| s.date > since && !s.denominator.is_zero())
            .fold(Decimal::ONE, |acc, s| acc * s.numerator / s.denominator)
    }
}

/// 실적 발표 및 배당 일정 (TTL 6시간).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct CalendarData {
    /// 예정 실적 발표일 (범위로 제공되면 시작/끝 두 개)
    pub earnings_dates: Vec<NaiveDate>,
    pub earnings_average: Option<Decimal>,
    pub earnings_low: Option<Decimal>,
    pub earnings_high: Option<Decimal>,
    pub revenue_average: Option<Decimal>,
    pub revenue_low: Option<Decimal>,
    pub revenue_high: Option<Decimal>,
    pub ex_dividend_date: Option<NaiveDate>,
    pub dividend_date: Option<NaiveDate>,
}

impl CategoryPayload for CalendarData {
    const CATEGORY: DataCategory = DataCategory::Calendar;
}

impl CalendarData {
    /// `today` 이후 가장 가까운 실적 발표일.
    pub fn next_earnings(&self, today: NaiveDate) -> Option<NaiveDate> {
        self.earnings_dates.iter().copied().filter(|d| *d >= today).min()
    }
}

/// 한 기간의 추천 분포.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct RecommendationPeriod {
    /// "0m"(이번 달), "-1m" 등
    pub period: String,
    pub strong_buy: u32,
    pub buy: u32,
    pub hold: u32,
    pub sell: u32,
    pub strong_sell: u32,
}

impl RecommendationPeriod {
    pub fn total(&self) -> u32 {
        self.strong_buy + self.buy + self.hold + self.sell + self.strong_sell
    }

    /// 1(적극 매수) ~ 5(적극 매도) 가중 평균. 의견이 없으면 `None`.
    pub fn score(&self) -> Option<Decimal> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let weighted = self.strong_buy
            + self.buy * 2
            + self.hold * 3
            + self.sell * 4
            + self.strong_sell * 5;
        Some((Decimal::from(weighted) / Decimal::from(total)).round_dp(2))
    }
}

/// 투자의견 변경 이력.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct RatingChange {
    pub date: DateTime<Utc>,
    pub firm: String,
    pub to_grade: String,
    pub from_grade: Option<String>,
    /// up, down, main, init, reit
    pub action: String,
}

/// 애널리스트 추천 및 목표가 (TTL 4시간).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct AnalystData {
    pub recommendation_trend: Vec<RecommendationPeriod>,
    pub target_mean: Option<Decimal>,
    pub target_high: Option<Decimal>,
    pub target_low: Option<Decimal>,
    pub target_median: Option<Decimal>,
    pub recommendation_key: Option<String>,
    pub analyst_count: Option<u32>,
    pub upgrades_downgrades: Vec<RatingChange>,
}

impl CategoryPayload for AnalystData {
    const CATEGORY: DataCategory = DataCategory::Analyst;
}

impl AnalystData {
    /// 가장 최근 기간("0m" 우선)의 컨센서스 점수.
    pub fn consensus_score(&self) -> Option<Decimal> {
        self.recommendation_trend
            .iter()
            .find(|p| p.period == "0m")
            .or_else(|| self.recommendation_trend.first())
            .and_then(RecommendationPeriod::score)
    }

    /// 현재가 대비 평균 목표가 상승여력 (%).
    pub fn upside_pct(&self, price: Decimal) -> Option<Decimal> {
        if price.is_zero() {
            return None;
        }
        self.target_mean
            .map(|target| ((target - price) / price * Decimal::ONE_HUNDRED).round_dp(2))
    }
}

/// 기관 보유자.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct Holder {
    pub organization: String,
    pub pct_held: Option<Decimal>,
    pub shares: Option<i64>,
    pub value: Option<i64>,
    pub report_date: Option<NaiveDate>,
}

/// 내부자/기관 보유 현황 (TTL 12시간).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct HoldersData {
    pub insiders_pct: Option<Decimal>,
    pub institutions_pct: Option<Decimal>,
    pub institutions_float_pct: Option<Decimal>,
    pub institutions_count: Option<i64>,
    pub top_institutions: Vec<Holder>,
}

impl CategoryPayload for HoldersData {
    const CATEGORY: DataCategory = DataCategory::Holders;
}
