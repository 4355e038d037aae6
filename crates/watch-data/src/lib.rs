//! 시세 데이터 조회 및 캐시.
//!
//! 이 crate는 다음을 제공합니다:
//! - Yahoo Finance 기반 시세/확장 데이터 제공자
//! - 카테고리별 TTL을 가진 확장 데이터 캐시 (PostgreSQL 또는 메모리)
//! - 실시간 시세용 단기 메모리 캐시

pub mod cache;
pub mod error;
pub mod models;
pub mod provider;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::{DataError, Result};

pub use models::{
    AnalystData, CalendarData, CategoryPayload, DividendEvent, DividendsSplits, ExtendedData,
    Holder, HoldersData, RatingChange, RecommendationPeriod, SplitEvent,
};

pub use provider::{MarketDataProvider, YahooHttpClient, YahooMarketDataProvider};

// 캐시 타입 재내보내기
pub use cache::{
    CacheEntry, CacheStats, CacheStore, Cached, CategoryOutcome, CategoryStats, CategoryTtl,
    DataSource, ExtendedDataCache, MemoryCacheStore, PgCacheStore, QuoteCache, StockOverview,
};
