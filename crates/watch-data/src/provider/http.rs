//! Yahoo Finance HTTP 클라이언트.
//!
//! `yahoo_finance_api` 크레이트가 다루지 않는 엔드포인트를 직접 호출합니다:
//! - `/v10/finance/quoteSummary` (calendarEvents, recommendationTrend, financialData,
//!   upgradeDowngradeHistory, majorHoldersBreakdown, institutionOwnership, assetProfile)
//! - `/v8/finance/chart` 배당/분할 이벤트
//! - `/v1/finance/search`
//!
//! quoteSummary는 쿠키 + crumb 인증이 필요하므로 첫 호출 시 crumb를 받아 캐시하고,
//! 401/403 응답을 받으면 한 번 갱신 후 재시도합니다.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use watch_core::{ProviderConfig, StockSymbol, SymbolMatch};

use super::yahoo::round_decimal_from_f64;
use crate::error::{DataError, Result};
use crate::models::{
    AnalystData, CalendarData, DividendEvent, DividendsSplits, Holder, HoldersData, RatingChange,
    RecommendationPeriod, SplitEvent,
};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const MAX_UPGRADE_HISTORY: usize = 20;
const MAX_TOP_INSTITUTIONS: usize = 10;

/// Yahoo Finance REST 클라이언트.
pub struct YahooHttpClient {
    client: reqwest::Client,
    base_url: String,
    cookie_url: Option<String>,
    max_retries: u32,
    crumb: RwLock<Option<String>>,
}

impl YahooHttpClient {
    /// 설정으로 클라이언트를 생성합니다.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Self::build(
            &config.quote_summary_base_url,
            Some(COOKIE_URL.to_string()),
            Duration::from_secs(config.request_timeout_secs),
            config.max_retries,
        )
    }

    /// 쿠키 발급 단계 없이 지정한 서버를 호출하는 클라이언트 (로컬 서버/테스트용).
    pub fn with_base_url(base_url: impl Into<String>, max_retries: u32) -> Result<Self> {
        Self::build(&base_url.into(), None, Duration::from_secs(5), max_retries)
    }

    fn build(
        base_url: &str,
        cookie_url: Option<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::ConnectionError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_url,
            max_retries,
            crumb: RwLock::new(None),
        })
    }

    async fn crumb(&self) -> Result<String> {
        if let Some(crumb) = self.crumb.read().await.clone() {
            return Ok(crumb);
        }

        let mut guard = self.crumb.write().await;
        if let Some(crumb) = guard.clone() {
            return Ok(crumb);
        }

        if let Some(cookie_url) = &self.cookie_url {
            // 쿠키만 필요하므로 응답 상태는 무시
            if let Err(e) = self.client.get(cookie_url).send().await {
                debug!(error = %e, "Yahoo 쿠키 요청 실패");
            }
        }

        let response = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited("crumb 요청 한도 초과".to_string()));
        }
        if !response.status().is_success() {
            return Err(DataError::FetchError(format!(
                "crumb 요청 실패: HTTP {}",
                response.status()
            )));
        }

        let crumb = response.text().await?.trim().to_string();
        if crumb.is_empty() || crumb.contains('<') {
            return Err(DataError::ParseError("유효하지 않은 crumb 응답".to_string()));
        }

        debug!("Yahoo crumb 갱신");
        *guard = Some(crumb.clone());
        Ok(crumb)
    }

    async fn reset_crumb(&self) {
        *self.crumb.write().await = None;
    }

    /// GET 요청 후 JSON을 파싱합니다.
    ///
    /// 5xx/네트워크 오류는 `500ms * attempt` 대기 후 재시도, 429는 즉시 `RateLimited`,
    /// 404는 `NoData`로 변환합니다.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        with_crumb: bool,
        context: &str,
    ) -> Result<T> {
        let mut crumb_refreshed = false;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let mut params: Vec<(&str, String)> = query.to_vec();
            if with_crumb {
                params.push(("crumb", self.crumb().await?));
            }

            let result = self.client.get(url).query(&params).send().await;

            let retry_reason = match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|e| {
                            DataError::ParseError(format!("{} 응답 파싱 실패: {}", context, e))
                        });
                    }
                    match status {
                        StatusCode::TOO_MANY_REQUESTS => {
                            return Err(DataError::RateLimited(context.to_string()));
                        }
                        StatusCode::NOT_FOUND => {
                            return Err(DataError::NoData(context.to_string()));
                        }
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
                            if with_crumb && !crumb_refreshed =>
                        {
                            crumb_refreshed = true;
                            self.reset_crumb().await;
                            attempt -= 1;
                            continue;
                        }
                        s if s.is_server_error() => format!("HTTP {}", s),
                        s => {
                            return Err(DataError::FetchError(format!(
                                "{} 요청 실패: HTTP {}",
                                context, s
                            )));
                        }
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => e.to_string(),
                Err(e) => return Err(e.into()),
            };

            if attempt > self.max_retries {
                return Err(DataError::FetchError(format!(
                    "{} 요청 실패 ({}회 시도): {}",
                    context, attempt, retry_reason
                )));
            }

            warn!(
                context = context,
                attempt = attempt,
                max_retries = self.max_retries,
                reason = %retry_reason,
                "Yahoo 요청 재시도 예정"
            );
            tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
        }
    }

    async fn quote_summary(&self, symbol: &StockSymbol, modules: &[&str]) -> Result<SummaryModules> {
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol);
        let context = format!("quoteSummary {} [{}]", symbol, modules.join(","));

        let envelope: QuoteSummaryEnvelope = self
            .get_json(&url, &[("modules", modules.join(","))], true, &context)
            .await?;

        if let Some(err) = envelope.quote_summary.error {
            return Err(DataError::FetchError(format!(
                "{}: {} ({})",
                context, err.description, err.code
            )));
        }

        envelope
            .quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| DataError::NoData(context))
    }

    /// 종목 검색.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SymbolMatch>> {
        let url = format!("{}/v1/finance/search", self.base_url);
        let response: SearchResponse = self
            .get_json(
                &url,
                &[
                    ("q", query.to_string()),
                    ("quotesCount", limit.to_string()),
                    ("newsCount", "0".to_string()),
                ],
                false,
                "search",
            )
            .await?;

        Ok(response
            .quotes
            .into_iter()
            .filter_map(|q| {
                let symbol = q.symbol?;
                let name = q.long_name.or(q.short_name).unwrap_or_else(|| symbol.clone());
                Some(SymbolMatch {
                    symbol,
                    name,
                    exchange: q.exch_disp.or(q.exchange),
                    quote_type: q.quote_type,
                })
            })
            .take(limit)
            .collect())
    }

    /// 전체 기간의 배당/분할 이벤트.
    pub async fn dividends_splits(&self, symbol: &StockSymbol) -> Result<DividendsSplits> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let context = format!("chart events {}", symbol);
        let response: ChartEnvelope = self
            .get_json(
                &url,
                &[
                    ("range", "max".to_string()),
                    ("interval", "1mo".to_string()),
                    ("events", "div|split".to_string()),
                ],
                false,
                &context,
            )
            .await?;

        if let Some(err) = response.chart.error {
            return Err(DataError::FetchError(format!(
                "{}: {} ({})",
                context, err.description, err.code
            )));
        }

        let events = response
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .and_then(|r| r.events)
            .unwrap_or_default();

        let mut data = DividendsSplits {
            dividends: events
                .dividends
                .into_values()
                .filter_map(|d| {
                    Some(DividendEvent {
                        date: timestamp_to_utc(d.date)?,
                        amount: round_decimal_from_f64(d.amount)?,
                    })
                })
                .collect(),
            splits: events
                .splits
                .into_values()
                .filter_map(|s| {
                    let numerator = Decimal::from_f64(s.numerator)?;
                    let denominator = Decimal::from_f64(s.denominator)?;
                    Some(SplitEvent {
                        date: timestamp_to_utc(s.date)?,
                        ratio: s
                            .split_ratio
                            .map(|r| r.replace('/', ":"))
                            .unwrap_or_else(|| format!("{}:{}", numerator, denominator)),
                        numerator,
                        denominator,
                    })
                })
                .collect(),
        };
        data.sort_newest_first();

        Ok(data)
    }

    /// 실적 발표 및 배당 일정.
    pub async fn calendar(&self, symbol: &StockSymbol) -> Result<CalendarData> {
        let modules = self.quote_summary(symbol, &["calendarEvents"]).await?;
        let events = modules
            .calendar_events
            .ok_or_else(|| DataError::NoData(format!("calendarEvents {}", symbol)))?;
        let earnings = events.earnings.unwrap_or_default();

        let mut earnings_dates: Vec<NaiveDate> = earnings
            .earnings_date
            .iter()
            .filter_map(|d| d.raw)
            .filter_map(|ts| timestamp_to_utc(ts as i64))
            .map(|dt| dt.date_naive())
            .collect();
        earnings_dates.sort();
        earnings_dates.dedup();

        Ok(CalendarData {
            earnings_dates,
            earnings_average: raw_decimal(&earnings.earnings_average),
            earnings_low: raw_decimal(&earnings.earnings_low),
            earnings_high: raw_decimal(&earnings.earnings_high),
            revenue_average: raw_decimal(&earnings.revenue_average),
            revenue_low: raw_decimal(&earnings.revenue_low),
            revenue_high: raw_decimal(&earnings.revenue_high),
            ex_dividend_date: raw_date(&events.ex_dividend_date),
            dividend_date: raw_date(&events.dividend_date),
        })
    }

    /// 애널리스트 추천, 목표가, 투자의견 변경 이력.
    pub async fn analyst(&self, symbol: &StockSymbol) -> Result<AnalystData> {
        let modules = self
            .quote_summary(
                symbol,
                &["recommendationTrend", "financialData", "upgradeDowngradeHistory"],
            )
            .await?;

        let recommendation_trend = modules
            .recommendation_trend
            .map(|m| m.trend)
            .unwrap_or_default()
            .into_iter()
            .map(|t| RecommendationPeriod {
                period: t.period,
                strong_buy: t.strong_buy,
                buy: t.buy,
                hold: t.hold,
                sell: t.sell,
                strong_sell: t.strong_sell,
            })
            .collect();

        let financial = modules.financial_data.unwrap_or_default();

        let mut upgrades_downgrades: Vec<RatingChange> = modules
            .upgrade_downgrade_history
            .map(|m| m.history)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|g| {
                Some(RatingChange {
                    date: timestamp_to_utc(g.epoch_grade_date)?,
                    firm: g.firm,
                    to_grade: g.to_grade,
                    from_grade: g.from_grade.filter(|s| !s.is_empty()),
                    action: g.action,
                })
            })
            .collect();
        upgrades_downgrades.sort_by(|a, b| b.date.cmp(&a.date));
        upgrades_downgrades.truncate(MAX_UPGRADE_HISTORY);

        Ok(AnalystData {
            recommendation_trend,
            target_mean: raw_decimal(&financial.target_mean_price),
            target_high: raw_decimal(&financial.target_high_price),
            target_low: raw_decimal(&financial.target_low_price),
            target_median: raw_decimal(&financial.target_median_price),
            recommendation_key: financial.recommendation_key.filter(|k| k != "none"),
            analyst_count: financial
                .number_of_analyst_opinions
                .and_then(|n| n.raw)
                .map(|n| n as u32),
            upgrades_downgrades,
        })
    }

    /// 내부자/기관 보유 현황.
    pub async fn holders(&self, symbol: &StockSymbol) -> Result<HoldersData> {
        let modules = self
            .quote_summary(symbol, &["majorHoldersBreakdown", "institutionOwnership"])
            .await?;

        let breakdown = modules.major_holders_breakdown.unwrap_or_default();
        let mut top_institutions: Vec<Holder> = modules
            .institution_ownership
            .map(|m| m.ownership_list)
            .unwrap_or_default()
            .into_iter()
            .map(|o| Holder {
                organization: o.organization,
                pct_held: raw_pct(&o.pct_held),
                shares: o.position.and_then(|p| p.raw).map(|v| v as i64),
                value: o.value.and_then(|p| p.raw).map(|v| v as i64),
                report_date: raw_date(&o.report_date),
            })
            .collect();
        top_institutions.truncate(MAX_TOP_INSTITUTIONS);

        Ok(HoldersData {
            insiders_pct: raw_pct(&breakdown.insiders_percent_held),
            institutions_pct: raw_pct(&breakdown.institutions_percent_held),
            institutions_float_pct: raw_pct(&breakdown.institutions_float_percent_held),
            institutions_count: breakdown.institutions_count.and_then(|c| c.raw).map(|c| c as i64),
            top_institutions,
        })
    }

    /// 섹터/산업 분류.
    pub async fn asset_profile(
        &self,
        symbol: &StockSymbol,
    ) -> Result<(Option<String>, Option<String>)> {
        let modules = self.quote_summary(symbol, &["assetProfile"]).await?;
        let profile = modules.asset_profile.unwrap_or_default();
        Ok((profile.sector, profile.industry))
    }
}

fn timestamp_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn raw_decimal(value: &Option<RawNum>) -> Option<Decimal> {
    value.as_ref().and_then(|v| v.raw).and_then(round_decimal_from_f64)
}

/// 0~1 비율을 % 값으로 변환.
fn raw_pct(value: &Option<RawNum>) -> Option<Decimal> {
    value
        .as_ref()
        .and_then(|v| v.raw)
        .and_then(|v| Decimal::from_f64(v * 100.0))
        .map(|d| d.round_dp(2))
}

fn raw_date(value: &Option<RawNum>) -> Option<NaiveDate> {
    value
        .as_ref()
        .and_then(|v| v.raw)
        .and_then(|ts| timestamp_to_utc(ts as i64))
        .map(|dt| dt.date_naive())
}

// ==================== 응답 스키마 ====================

/// `{"raw": 1.23, "fmt": "1.23"}` 형식의 숫자.
#[derive(Debug, Default, Deserialize)]
struct RawNum {
    raw: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct YahooApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryEnvelope {
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    result: Option<Vec<SummaryModules>>,
    error: Option<YahooApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryModules {
    calendar_events: Option<CalendarEventsModule>,
    recommendation_trend: Option<RecommendationTrendModule>,
    financial_data: Option<FinancialDataModule>,
    upgrade_downgrade_history: Option<UpgradeDowngradeModule>,
    major_holders_breakdown: Option<MajorHoldersModule>,
    institution_ownership: Option<InstitutionOwnershipModule>,
    asset_profile: Option<AssetProfileModule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarEventsModule {
    earnings: Option<EarningsBlock>,
    ex_dividend_date: Option<RawNum>,
    dividend_date: Option<RawNum>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarningsBlock {
    #[serde(default)]
    earnings_date: Vec<RawNum>,
    earnings_average: Option<RawNum>,
    earnings_low: Option<RawNum>,
    earnings_high: Option<RawNum>,
    revenue_average: Option<RawNum>,
    revenue_low: Option<RawNum>,
    revenue_high: Option<RawNum>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationTrendModule {
    #[serde(default)]
    trend: Vec<RawTrend>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrend {
    period: String,
    #[serde(default)]
    strong_buy: u32,
    #[serde(default)]
    buy: u32,
    #[serde(default)]
    hold: u32,
    #[serde(default)]
    sell: u32,
    #[serde(default)]
    strong_sell: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialDataModule {
    target_mean_price: Option<RawNum>,
    target_high_price: Option<RawNum>,
    target_low_price: Option<RawNum>,
    target_median_price: Option<RawNum>,
    recommendation_key: Option<String>,
    number_of_analyst_opinions: Option<RawNum>,
}

#[derive(Debug, Default, Deserialize)]
struct UpgradeDowngradeModule {
    #[serde(default)]
    history: Vec<RawGrade>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGrade {
    epoch_grade_date: i64,
    #[serde(default)]
    firm: String,
    #[serde(default)]
    to_grade: String,
    from_grade: Option<String>,
    #[serde(default)]
    action: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MajorHoldersModule {
    insiders_percent_held: Option<RawNum>,
    institutions_percent_held: Option<RawNum>,
    institutions_float_percent_held: Option<RawNum>,
    institutions_count: Option<RawNum>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstitutionOwnershipModule {
    #[serde(default)]
    ownership_list: Vec<RawOwner>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOwner {
    #[serde(default)]
    organization: String,
    report_date: Option<RawNum>,
    pct_held: Option<RawNum>,
    position: Option<RawNum>,
    value: Option<RawNum>,
}

#[derive(Debug, Default, Deserialize)]
struct AssetProfileModule {
    sector: Option<String>,
    industry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuote {
    symbol: Option<String>,
    #[serde(rename = "shortname")]
    short_name: Option<String>,
    #[serde(rename = "longname")]
    long_name: Option<String>,
    exchange: Option<String>,
    exch_disp: Option<String>,
    quote_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    events: Option<ChartEvents>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, RawDividend>,
    #[serde(default)]
    splits: HashMap<String, RawSplit>,
}

#[derive(Debug, Deserialize)]
struct RawDividend {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSplit {
    date: i64,
    numerator: f64,
    denominator: f64,
    split_ratio: Option<String>,
}
