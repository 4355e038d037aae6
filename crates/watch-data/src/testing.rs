//! 테스트용 시세 제공자.
//!
//! 네트워크 없이 캐시/라우트 동작을 검증하기 위해 사용합니다.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use watch_core::{DataCategory, Period, PricePoint, Quote, StockSymbol, SymbolMatch};

use crate::error::{DataError, Result};
use crate::models::{
    AnalystData, CalendarData, CategoryPayload, DividendsSplits, ExtendedData, HoldersData,
};
use crate::provider::MarketDataProvider;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 설정 가능한 가짜 제공자.
///
/// 카테고리 페이로드를 설정하지 않으면 `Default` 값을 반환합니다.
#[derive(Default)]
pub struct MockMarketDataProvider {
    quotes: Mutex<HashMap<String, Quote>>,
    history: Mutex<HashMap<String, Vec<PricePoint>>>,
    payloads: Mutex<HashMap<(String, DataCategory), serde_json::Value>>,
    failing: Mutex<HashSet<DataCategory>>,
    unknown: Mutex<HashSet<String>>,
    fail_quotes: Mutex<bool>,
    calls: Mutex<HashMap<DataCategory, usize>>,
    quote_calls: Mutex<usize>,
}

impl MockMarketDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(self, symbol: &str, price: Decimal, previous_close: Decimal) -> Self {
        self.set_quote(symbol, price, previous_close);
        self
    }

    pub fn with_history(self, symbol: &str, points: Vec<PricePoint>) -> Self {
        lock(&self.history).insert(symbol.to_string(), points);
        self
    }

    pub fn set_quote(&self, symbol: &str, price: Decimal, previous_close: Decimal) {
        let Ok(parsed) = StockSymbol::parse(symbol) else {
            return;
        };
        let quote = Quote::new(parsed, price, Some(previous_close));
        lock(&self.quotes).insert(symbol.to_uppercase(), quote);
    }

    pub fn set_payload<T: CategoryPayload>(&self, symbol: &str, payload: &T) {
        if let Ok(value) = serde_json::to_value(payload) {
            lock(&self.payloads).insert((symbol.to_uppercase(), T::CATEGORY), value);
        }
    }

    /// 카테고리 조회를 실패하도록 설정합니다.
    pub fn fail_category(&self, category: DataCategory, fail: bool) {
        let mut failing = lock(&self.failing);
        if fail {
            failing.insert(category);
        } else {
            failing.remove(&category);
        }
    }

    /// 해당 종목의 카테고리 조회가 `NoData`를 반환하도록 설정합니다.
    pub fn with_unknown_symbol(self, symbol: &str) -> Self {
        lock(&self.unknown).insert(symbol.to_uppercase());
        self
    }

    pub fn fail_quotes(&self, fail: bool) {
        *lock(&self.fail_quotes) = fail;
    }

    /// 카테고리별 upstream 호출 횟수.
    pub fn calls(&self, category: DataCategory) -> usize {
        lock(&self.calls).get(&category).copied().unwrap_or(0)
    }

    pub fn quote_calls(&self) -> usize {
        *lock(&self.quote_calls)
    }

    fn payload<T: CategoryPayload + Default>(&self, symbol: &StockSymbol) -> Result<T> {
        *lock(&self.calls).entry(T::CATEGORY).or_insert(0) += 1;

        if lock(&self.failing).contains(&T::CATEGORY) {
            return Err(DataError::FetchError(format!(
                "mock upstream failure: {}/{}",
                symbol,
                T::CATEGORY
            )));
        }
        if lock(&self.unknown).contains(symbol.as_str()) {
            return Err(DataError::NoData(symbol.to_string()));
        }

        match lock(&self.payloads).get(&(symbol.to_string(), T::CATEGORY)) {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(T::default()),
        }
    }
}

/// 일정 비율로 움직이는 일봉 시계열을 생성합니다.
///
/// `closes`의 각 값이 하루 종가가 되며, 고가/저가는 종가 ±1%입니다.
pub fn daily_series(closes: &[Decimal]) -> Vec<PricePoint> {
    let start = Utc::now() - Duration::days(closes.len() as i64);
    let pct = Decimal::new(1, 2);
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| PricePoint {
            time: start + Duration::days(i as i64),
            open: *close,
            high: *close + *close * pct,
            low: *close - *close * pct,
            close: *close,
            volume: Decimal::from(1_000 + i as i64 * 10),
        })
        .collect()
}

#[async_trait]
impl MarketDataProvider for MockMarketDataProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn quote(&self, symbol: &StockSymbol) -> Result<Quote> {
        *lock(&self.quote_calls) += 1;
        if *lock(&self.fail_quotes) {
            return Err(DataError::FetchError(format!("mock quote failure: {}", symbol)));
        }
        lock(&self.quotes)
            .get(symbol.as_str())
            .cloned()
            .ok_or_else(|| DataError::NoData(symbol.to_string()))
    }

    async fn history(&self, symbol: &StockSymbol, _period: Period) -> Result<Vec<PricePoint>> {
        lock(&self.history)
            .get(symbol.as_str())
            .cloned()
            .ok_or_else(|| DataError::NoData(symbol.to_string()))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SymbolMatch>> {
        let query = query.to_uppercase();
        let mut matches: Vec<SymbolMatch> = lock(&self.quotes)
            .keys()
            .filter(|s| s.contains(&query))
            .map(|s| SymbolMatch {
                symbol: s.clone(),
                name: s.clone(),
                exchange: None,
                quote_type: Some("EQUITY".to_string()),
            })
            .collect();
        matches.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn extended(&self, symbol: &StockSymbol) -> Result<ExtendedData> {
        self.payload(symbol)
    }

    async fn dividends_splits(&self, symbol: &StockSymbol) -> Result<DividendsSplits> {
        self.payload(symbol)
    }

    async fn calendar(&self, symbol: &StockSymbol) -> Result<CalendarData> {
        self.payload(symbol)
    }

    async fn analyst(&self, symbol: &StockSymbol) -> Result<AnalystData> {
        self.payload(symbol)
    }

    async fn holders(&self, symbol: &StockSymbol) -> Result<HoldersData> {
        self.payload(symbol)
    }
}
