//! 확장 데이터 캐시.
//!
//! - [`ExtendedDataCache`] - 카테고리별 TTL, 실패 시 stale 데이터 반환
//! - [`CacheStore`] - 저장소 추상화 ([`PgCacheStore`], [`MemoryCacheStore`])
//! - [`QuoteCache`] - 실시간 시세용 짧은 TTL 메모리 캐시

mod entry;
mod memory;
mod postgres;
mod quote;
mod service;

pub use entry::{CacheEntry, CacheStats, Cached, CategoryStats, CategoryTtl, DataSource};
pub use memory::MemoryCacheStore;
pub use postgres::PgCacheStore;
pub use quote::QuoteCache;
pub use service::{CategoryOutcome, ExtendedDataCache, StockOverview};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use watch_core::DataCategory;

use crate::error::Result;

/// 캐시 저장소.
///
/// 키는 `(symbol, category)`이며 카테고리당 한 행만 존재합니다.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 저장소 종류 (헬스체크용).
    fn kind(&self) -> &'static str;

    async fn get(&self, symbol: &str, category: DataCategory) -> Result<Option<CacheEntry>>;

    /// 행을 그대로 저장합니다. `success`와 `error_message`도 주어진 값을 따릅니다.
    async fn upsert(&self, entry: &CacheEntry) -> Result<()>;

    /// 조회 실패를 기록합니다.
    ///
    /// 기존 데이터와 `fetched_at`은 유지하고 `success = false`, `error_message`,
    /// `expires_at = retry_at`만 갱신합니다. 행이 없으면 데이터 없이 생성합니다.
    async fn record_failure(
        &self,
        symbol: &str,
        category: DataCategory,
        error: &str,
        now: DateTime<Utc>,
        retry_at: DateTime<Utc>,
    ) -> Result<()>;

    /// 한 종목의 캐시를 삭제합니다. `category`가 없으면 전체 카테고리.
    async fn invalidate(&self, symbol: &str, category: Option<DataCategory>) -> Result<u64>;

    /// 특정 카테고리의 모든 종목 캐시를 삭제합니다.
    async fn invalidate_category(&self, category: DataCategory) -> Result<u64>;

    async fn invalidate_all(&self) -> Result<u64>;

    /// `expires_at < cutoff`인 행을 삭제합니다.
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// 카테고리별 통계.
    async fn category_stats(&self, now: DateTime<Utc>) -> Result<Vec<CategoryStats>>;

    /// 연결 확인.
    async fn ping(&self) -> Result<()>;
}
