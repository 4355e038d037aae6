//! Yahoo Finance 시세 제공자.
//!
//! 시세/차트와 기본 지표는 `yahoo_finance_api` 커넥터로,
//! 일정/애널리스트/보유자/배당 이벤트/검색은 [`YahooHttpClient`]로 조회합니다.
//!
//! # 심볼 형식
//!
//! - 미국 주식: "AAPL", "BRK-B"
//! - 한국 주식: "005930.KS" (코스피), "124560.KQ" (코스닥)
//! - 지수: "^GSPC", "^IXIC"

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use watch_core::{Period, PricePoint, ProviderConfig, Quote, StockSymbol, SymbolMatch};
use yahoo_finance_api as yahoo;

use super::http::YahooHttpClient;
use super::MarketDataProvider;
use crate::error::{DataError, Result};
use crate::models::{AnalystData, CalendarData, DividendsSplits, ExtendedData, HoldersData};

/// f64를 Decimal로 변환 후 소수점 4자리로 반올림.
///
/// NaN/무한대는 `None`입니다.
pub fn round_decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|d| d.round_dp(4))
}

/// 비율(0.25)을 % 값(25.00)으로 변환.
fn ratio_to_pct(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value * 100.0).map(|d| d.round_dp(2))
}

/// 심볼 접미사로 통화를 추정합니다.
pub(crate) fn guess_currency(symbol: &str) -> &'static str {
    if symbol.ends_with(".KS") || symbol.ends_with(".KQ") {
        "KRW"
    } else if symbol.ends_with(".T") {
        "JPY"
    } else if symbol.ends_with(".L") {
        "GBP"
    } else if symbol.ends_with(".HK") {
        "HKD"
    } else {
        "USD"
    }
}

/// Yahoo Finance 기반 [`MarketDataProvider`].
pub struct YahooMarketDataProvider {
    connector: yahoo::YahooConnector,
    /// `get_ticker_info`는 `&mut self`가 필요하므로 별도 커넥터를 Mutex로 감쌉니다.
    info_connector: Mutex<yahoo::YahooConnector>,
    http: YahooHttpClient,
    max_retries: u32,
}

impl YahooMarketDataProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let connect = || {
            yahoo::YahooConnector::new().map_err(|e| {
                DataError::ConnectionError(format!("Yahoo Finance 연결 실패: {}", e))
            })
        };

        Ok(Self {
            connector: connect()?,
            info_connector: Mutex::new(connect()?),
            http: YahooHttpClient::new(config)?,
            max_retries: config.max_retries.max(1),
        })
    }

    async fn fetch_range(
        &self,
        symbol: &StockSymbol,
        interval: &str,
        range: &str,
    ) -> Result<(Vec<PricePoint>, Option<String>)> {
        debug!(symbol = %symbol, interval = interval, range = range, "Yahoo Finance 차트 조회");

        let response = self
            .connector
            .get_quote_range(symbol.as_str(), interval, range)
            .await
            .map_err(|e| DataError::FetchError(format!("Yahoo Finance API 오류 ({}): {}", symbol, e)))?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::ParseError(format!("Quote 파싱 오류 ({}): {}", symbol, e)))?;
        let currency = response.metadata().ok().and_then(|m| m.currency.clone());

        let mut points: Vec<PricePoint> = quotes
            .iter()
            .filter_map(|q| {
                let time = Utc.timestamp_opt(q.timestamp as i64, 0).single()?;
                Some(PricePoint {
                    time,
                    open: round_decimal_from_f64(q.open)?,
                    high: round_decimal_from_f64(q.high)?,
                    low: round_decimal_from_f64(q.low)?,
                    close: round_decimal_from_f64(q.close)?,
                    volume: Decimal::from(q.volume as u64),
                })
            })
            .collect();

        points.sort_by_key(|p| p.time);
        points.dedup_by_key(|p| p.time);

        Ok((points, currency))
    }

    /// 기본 지표 조회 (재시도 포함).
    async fn fetch_ticker_info_with_retry(&self, symbol: &StockSymbol) -> Result<ExtendedData> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.fetch_ticker_info(symbol).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    if attempt < self.max_retries {
                        debug!(
                            symbol = %symbol,
                            attempt = attempt,
                            max_retries = self.max_retries,
                            error = %e,
                            "기본 지표 조회 재시도 예정"
                        );
                        tokio::time::sleep(std::time::Duration::from_millis(500 * attempt as u64))
                            .await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| DataError::FetchError(format!("기본 지표 조회 실패: {}", symbol))))
    }

    async fn fetch_ticker_info(&self, symbol: &StockSymbol) -> Result<ExtendedData> {
        let summary = self
            .info_connector
            .lock()
            .await
            .get_ticker_info(symbol.as_str())
            .await
            .map_err(|e| {
                DataError::FetchError(format!("Yahoo ticker info 조회 실패 ({}): {}", symbol, e))
            })?;

        let result = summary
            .quote_summary
            .and_then(|qs| qs.result)
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| DataError::NoData(format!("ticker info {}", symbol)))?;

        let detail = result.summary_detail.as_ref();
        let stats = result.default_key_statistics.as_ref();
        let financial = result.financial_data.as_ref();

        let forward_pe_detail = detail.and_then(|sd| sd.forward_pe).and_then(round_decimal_from_f64);

        Ok(ExtendedData {
            name: result
                .quote_type
                .as_ref()
                .and_then(|qt| qt.long_name.clone().or(qt.short_name.clone())),
            market_cap: detail.and_then(|sd| sd.market_cap).and_then(Decimal::from_u64),
            shares_outstanding: stats.and_then(|ks| ks.shares_outstanding).map(|v| v as i64),
            trailing_pe: detail.and_then(|sd| sd.trailing_pe).and_then(round_decimal_from_f64),
            forward_pe: stats
                .and_then(|ks| ks.forward_pe)
                .and_then(round_decimal_from_f64)
                .or(forward_pe_detail),
            price_to_book: stats.and_then(|ks| ks.price_to_book).and_then(round_decimal_from_f64),
            eps: stats.and_then(|ks| ks.trailing_eps).and_then(round_decimal_from_f64),
            book_value: stats.and_then(|ks| ks.book_value).and_then(round_decimal_from_f64),
            dividend_yield: detail
                .and_then(|sd| sd.trailing_annual_dividend_yield)
                .and_then(ratio_to_pct),
            payout_ratio: detail.and_then(|sd| sd.payout_ratio).and_then(ratio_to_pct),
            roe: financial.and_then(|fd| fd.return_on_equity).and_then(ratio_to_pct),
            profit_margin: financial.and_then(|fd| fd.profit_margins).and_then(ratio_to_pct),
            operating_margin: financial.and_then(|fd| fd.operating_margins).and_then(ratio_to_pct),
            revenue_growth: financial.and_then(|fd| fd.revenue_growth).and_then(ratio_to_pct),
            earnings_growth: financial.and_then(|fd| fd.earnings_growth).and_then(ratio_to_pct),
            debt_to_equity: financial.and_then(|fd| fd.debt_to_equity).and_then(round_decimal_from_f64),
            currency: financial.and_then(|fd| fd.financial_currency.clone()),
            fetched_at: Utc::now(),
            ..Default::default()
        })
    }
}

/// 1년 일봉에서 52주 고저가와 평균 거래량(10일/3개월)을 계산합니다.
fn apply_price_statistics(data: &mut ExtendedData, points: &[PricePoint]) {
    if points.is_empty() {
        return;
    }

    data.week_52_high = points.iter().map(|p| p.high).max();
    data.week_52_low = points.iter().map(|p| p.low).min();

    let avg_volume = |n: usize| -> Option<i64> {
        let recent: Vec<Decimal> = points.iter().rev().take(n).map(|p| p.volume).collect();
        if recent.is_empty() {
            return None;
        }
        let sum: Decimal = recent.iter().sum();
        (sum / Decimal::from(recent.len())).trunc().to_i64()
    };
    data.avg_volume_10d = avg_volume(10);
    data.avg_volume_3m = avg_volume(63);
}

#[async_trait]
impl MarketDataProvider for YahooMarketDataProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn quote(&self, symbol: &StockSymbol) -> Result<Quote> {
        let (points, currency) = self.fetch_range(symbol, "1d", "5d").await?;

        let last = points
            .last()
            .ok_or_else(|| DataError::NoData(format!("시세 데이터 없음: {}", symbol)))?;
        let previous_close = points.len().checked_sub(2).map(|i| points[i].close);

        let mut quote = Quote::new(symbol.clone(), last.close, previous_close);
        quote.open = Some(last.open);
        quote.day_high = Some(last.high);
        quote.day_low = Some(last.low);
        quote.volume = Some(last.volume);
        quote.currency = currency.or_else(|| Some(guess_currency(symbol.as_str()).to_string()));
        quote.fetched_at = Utc::now();

        Ok(quote)
    }

    async fn history(&self, symbol: &StockSymbol, period: Period) -> Result<Vec<PricePoint>> {
        let (points, _) = self
            .fetch_range(symbol, period.interval(), period.as_str())
            .await?;

        if points.is_empty() {
            return Err(DataError::NoData(format!("{} {}", symbol, period)));
        }
        Ok(points)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SymbolMatch>> {
        self.http.search(query, limit).await
    }

    async fn extended(&self, symbol: &StockSymbol) -> Result<ExtendedData> {
        let mut data = self.fetch_ticker_info_with_retry(symbol).await?;

        match self.fetch_range(symbol, "1d", "1y").await {
            Ok((points, currency)) => {
                apply_price_statistics(&mut data, &points);
                if data.currency.is_none() {
                    data.currency = currency;
                }
            }
            Err(e) => warn!(symbol = %symbol, error = %e, "가격 통계 조회 실패, 생략"),
        }

        match self.http.asset_profile(symbol).await {
            Ok((sector, industry)) => {
                data.sector = sector;
                data.industry = industry;
            }
            Err(e) => debug!(symbol = %symbol, error = %e, "섹터 정보 조회 실패, 생략"),
        }

        info!(
            symbol = %symbol,
            market_cap = ?data.market_cap,
            per = ?data.trailing_pe,
            "확장 데이터 수집 완료"
        );

        Ok(data)
    }

    async fn dividends_splits(&self, symbol: &StockSymbol) -> Result<DividendsSplits> {
        self.http.dividends_splits(symbol).await
    }

    async fn calendar(&self, symbol: &StockSymbol) -> Result<CalendarData> {
        self.http.calendar(symbol).await
    }

    async fn analyst(&self, symbol: &StockSymbol) -> Result<AnalystData> {
        self.http.analyst(symbol).await
    }

    async fn holders(&self, symbol: &StockSymbol) -> Result<HoldersData> {
        self.http.holders(symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_decimal_from_f64() {
        assert_eq!(round_decimal_from_f64(1.234567), Some(dec!(1.2346)));
        assert_eq!(round_decimal_from_f64(f64::NAN), None);
        assert_eq!(ratio_to_pct(0.1234), Some(dec!(12.34)));
    }

    #[test]
    fn test_guess_currency() {
        assert_eq!(guess_currency("005930.KS"), "KRW");
        assert_eq!(guess_currency("7203.T"), "JPY");
        assert_eq!(guess_currency("AAPL"), "USD");
    }

    #[test]
    fn test_apply_price_statistics() {
        let start = Utc::now() - Duration::days(100);
        let points: Vec<PricePoint> = (0..100)
            .map(|i| PricePoint {
                time: start + Duration::days(i),
                open: dec!(100),
                high: Decimal::from(100 + i),
                low: Decimal::from(50 + i),
                close: dec!(100),
                volume: if i >= 90 { dec!(2000) } else { dec!(1000) },
            })
            .collect();

        let mut data = ExtendedData::default();
        apply_price_statistics(&mut data, &points);

        assert_eq!(data.week_52_high, Some(dec!(199)));
        assert_eq!(data.week_52_low, Some(dec!(50)));
        assert_eq!(data.avg_volume_10d, Some(2000));
        // 최근 63개 중 10개만 2000
        assert_eq!(data.avg_volume_3m, Some(1158));
    }
}
