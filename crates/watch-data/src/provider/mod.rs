//! 외부 시세 제공자 추상화.
//!
//! 캐시 계층과 API 핸들러는 [`MarketDataProvider`] 트레이트에만 의존하며,
//! 실제 구현은 [`YahooMarketDataProvider`]입니다.

mod http;
mod yahoo;

pub use http::YahooHttpClient;
pub use yahoo::{round_decimal_from_f64, YahooMarketDataProvider};

use async_trait::async_trait;
use watch_core::{Period, PricePoint, Quote, StockSymbol, SymbolMatch};

use crate::error::Result;
use crate::models::{AnalystData, CalendarData, DividendsSplits, ExtendedData, HoldersData};

/// 시세 및 확장 데이터 제공자.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 제공자 이름 (로그/헬스체크용).
    fn name(&self) -> &'static str;

    /// 현재 시세.
    async fn quote(&self, symbol: &StockSymbol) -> Result<Quote>;

    /// 기간별 OHLCV. 시간 오름차순.
    async fn history(&self, symbol: &StockSymbol, period: Period) -> Result<Vec<PricePoint>>;

    /// 종목명/티커 검색.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SymbolMatch>>;

    async fn extended(&self, symbol: &StockSymbol) -> Result<ExtendedData>;

    async fn dividends_splits(&self, symbol: &StockSymbol) -> Result<DividendsSplits>;

    async fn calendar(&self, symbol: &StockSymbol) -> Result<CalendarData>;

    async fn analyst(&self, symbol: &StockSymbol) -> Result<AnalystData>;

    async fn holders(&self, symbol: &StockSymbol) -> Result<HoldersData>;
}
