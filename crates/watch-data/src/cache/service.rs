//! 카테고리별 TTL 캐시 서비스.
//!
//! 조회 흐름 (cache-aside):
//!
//! 1. 유효한 캐시 → 그대로 반환 (`Cache`)
//! 2. 직전 조회가 실패했고 재시도 대기 중 → upstream 호출 없이 이전 데이터 반환 (`Stale`)
//! 3. 그 외 → upstream 조회 후 저장 (`Fresh`)
//! 4. upstream 실패 → 실패 기록 후 이전 데이터가 있으면 `Stale` + 경고, 없으면 에러
//!
//! ```text
//!          ┌────────── fresh? ──────────┐
//!   get ───┤                            ├──► Cache
//!          └─ fetch ─┬─ ok ─► upsert ───┴──► Fresh
//!                    └─ err ─► record_failure ─┬─ prior data ─► Stale (warning)
//!                                              └─ none ───────► DataError::Upstream
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use watch_core::{CacheConfig, DataCategory, StockSymbol};

use super::{CacheEntry, CacheStats, CacheStore, Cached, CategoryTtl, DataSource};
use crate::error::{DataError, Result};
use crate::models::{
    AnalystData, CalendarData, CategoryPayload, DividendsSplits, ExtendedData, HoldersData,
};
use crate::provider::MarketDataProvider;

/// 카테고리 하나의 조회 결과. 실패해도 다른 카테고리에 영향을 주지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct CategoryOutcome<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Cached<T>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> From<Result<Cached<T>>> for CategoryOutcome<T> {
    fn from(result: Result<Cached<T>>) -> Self {
        match result {
            Ok(cached) => Self {
                result: Some(cached),
                error: None,
            },
            Err(e) => Self {
                result: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// 다섯 카테고리를 한 번에 조회한 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct StockOverview {
    pub symbol: StockSymbol,
    pub extended: CategoryOutcome<ExtendedData>,
    pub dividends_splits: CategoryOutcome<DividendsSplits>,
    pub calendar: CategoryOutcome<CalendarData>,
    pub analyst: CategoryOutcome<AnalystData>,
    pub holders: CategoryOutcome<HoldersData>,
}

impl StockOverview {
    /// 하나라도 stale 데이터를 포함하는지.
    pub fn has_stale(&self) -> bool {
        self.extended.result.as_ref().is_some_and(Cached::is_stale)
            || self.dividends_splits.result.as_ref().is_some_and(Cached::is_stale)
            || self.calendar.result.as_ref().is_some_and(Cached::is_stale)
            || self.analyst.result.as_ref().is_some_and(Cached::is_stale)
            || self.holders.result.as_ref().is_some_and(Cached::is_stale)
    }

    /// 실패한 카테고리와 오류 메시지.
    pub fn errors(&self) -> BTreeMap<DataCategory, String> {
        let mut errors = BTreeMap::new();
        let mut push = |category, error: &Option<String>| {
            if let Some(e) = error {
                errors.insert(category, e.clone());
            }
        };
        push(DataCategory::Extended, &self.extended.error);
        push(DataCategory::DividendsSplits, &self.dividends_splits.error);
        push(DataCategory::Calendar, &self.calendar.error);
        push(DataCategory::Analyst, &self.analyst.error);
        push(DataCategory::Holders, &self.holders.error);
        errors
    }
}

/// 확장 데이터 캐시 서비스.
pub struct ExtendedDataCache {
    store: Arc<dyn CacheStore>,
    provider: Arc<dyn MarketDataProvider>,
    config: CacheConfig,
}

impl ExtendedDataCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        provider: Arc<dyn MarketDataProvider>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// 캐시 조회, 필요 시 `fetch`로 upstream 조회.
    #[instrument(skip_all, fields(symbol = %symbol, category = %T::CATEGORY))]
    pub async fn get_or_fetch<T, F, Fut>(&self, symbol: &StockSymbol, fetch: F) -> Result<Cached<T>>
    where
        T: CategoryPayload,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let category = T::CATEGORY;
        let now = Utc::now();

        let existing = match self.store.get(symbol.as_str(), category).await {
            Ok(entry) => entry,
            Err(e) => {
                // 저장소 장애 시에도 upstream 조회는 시도
                warn!(error = %e, "캐시 저장소 조회 실패");
                None
            }
        };

        // 한 번도 성공하지 못한 행이 재시도 대기 중이면 upstream을 다시 호출하지 않음
        if let Some(entry) = existing.as_ref() {
            if !entry.has_data() && entry.in_failure_backoff(now) {
                record_lookup(category, "error");
                return Err(backoff_error(symbol, category, entry.error_message.as_deref()));
            }
        }

        let previous: Option<(CacheEntry, T)> = existing
            .filter(CacheEntry::has_data)
            .and_then(|entry| match serde_json::from_value::<T>(entry.data.clone()) {
                Ok(data) => Some((entry, data)),
                Err(e) => {
                    warn!(error = %e, "캐시 데이터 역직렬화 실패, 무시");
                    None
                }
            });

        let previous = match previous {
            Some((entry, data)) if entry.is_fresh(now) => {
                debug!("캐시 적중");
                record_lookup(category, "hit");
                return Ok(cached(data, &entry, DataSource::Cache, None));
            }
            Some((entry, data)) if entry.in_failure_backoff(now) => {
                debug!("재시도 대기 중, stale 데이터 반환");
                record_lookup(category, "stale");
                let warning = stale_warning(entry.error_message.as_deref(), entry.fetched_at);
                return Ok(cached(data, &entry, DataSource::Stale, Some(warning)));
            }
            other => other,
        };

        match fetch().await {
            Ok(data) => {
                let ttl = self.config.ttl_for(category);
                let entry = CacheEntry::fresh(
                    symbol.as_str(),
                    category,
                    serde_json::to_value(&data)?,
                    now,
                    now + ttl,
                );
                if let Err(e) = self.store.upsert(&entry).await {
                    warn!(error = %e, "캐시 저장 실패");
                }
                record_lookup(category, "miss");
                Ok(cached(data, &entry, DataSource::Fresh, None))
            }
            Err(fetch_err) => {
                let message = failure_message(&fetch_err);
                let retry_at = now + self.config.failure_retry();
                if let Err(e) = self
                    .store
                    .record_failure(symbol.as_str(), category, &message, now, retry_at)
                    .await
                {
                    warn!(error = %e, "캐시 실패 기록 저장 실패");
                }

                match previous {
                    Some((mut entry, data)) => {
                        warn!(error = %message, fetched_at = %entry.fetched_at, "upstream 조회 실패, stale 데이터 반환");
                        record_lookup(category, "stale");
                        entry.expires_at = retry_at;
                        let warning = stale_warning(Some(&message), entry.fetched_at);
                        Ok(cached(data, &entry, DataSource::Stale, Some(warning)))
                    }
                    None => {
                        warn!(error = %message, "upstream 조회 실패, 캐시 데이터 없음");
                        record_lookup(category, "error");
                        match fetch_err {
                            DataError::NoData(_) | DataError::InvalidInput(_) => Err(fetch_err),
                            _ => Err(DataError::Upstream {
                                symbol: symbol.to_string(),
                                category,
                                message,
                            }),
                        }
                    }
                }
            }
        }
    }

    pub async fn extended(&self, symbol: &StockSymbol) -> Result<Cached<ExtendedData>> {
        self.get_or_fetch(symbol, || self.provider.extended(symbol)).await
    }

    pub async fn dividends_splits(&self, symbol: &StockSymbol) -> Result<Cached<DividendsSplits>> {
        self.get_or_fetch(symbol, || self.provider.dividends_splits(symbol))
            .await
    }

    pub async fn calendar(&self, symbol: &StockSymbol) -> Result<Cached<CalendarData>> {
        self.get_or_fetch(symbol, || self.provider.calendar(symbol)).await
    }

    pub async fn analyst(&self, symbol: &StockSymbol) -> Result<Cached<AnalystData>> {
        self.get_or_fetch(symbol, || self.provider.analyst(symbol)).await
    }

    pub async fn holders(&self, symbol: &StockSymbol) -> Result<Cached<HoldersData>> {
        self.get_or_fetch(symbol, || self.provider.holders(symbol)).await
    }

    /// 다섯 카테고리를 동시에 조회합니다.
    pub async fn overview(&self, symbol: &StockSymbol) -> StockOverview {
        let (extended, dividends_splits, calendar, analyst, holders) = futures::join!(
            self.extended(symbol),
            self.dividends_splits(symbol),
            self.calendar(symbol),
            self.analyst(symbol),
            self.holders(symbol),
        );

        StockOverview {
            symbol: symbol.clone(),
            extended: extended.into(),
            dividends_splits: dividends_splits.into(),
            calendar: calendar.into(),
            analyst: analyst.into(),
            holders: holders.into(),
        }
    }

    /// 한 종목의 캐시 삭제. `category`가 없으면 전체 카테고리.
    pub async fn invalidate(&self, symbol: &StockSymbol, category: Option<DataCategory>) -> Result<u64> {
        let removed = self.store.invalidate(symbol.as_str(), category).await?;
        info!(symbol = %symbol, category = ?category, removed = removed, "캐시 무효화");
        Ok(removed)
    }

    pub async fn invalidate_category(&self, category: DataCategory) -> Result<u64> {
        let removed = self.store.invalidate_category(category).await?;
        info!(category = %category, removed = removed, "카테고리 캐시 무효화");
        Ok(removed)
    }

    pub async fn invalidate_all(&self) -> Result<u64> {
        let removed = self.store.invalidate_all().await?;
        info!(removed = removed, "전체 캐시 무효화");
        Ok(removed)
    }

    /// 만료 후 보관 기간이 지난 행을 정리합니다.
    pub async fn cleanup(&self) -> Result<u64> {
        self.cleanup_at(Utc::now()).await
    }

    pub async fn cleanup_at(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now - self.config.stale_retention();
        let removed = self.store.delete_expired_before(cutoff).await?;
        if removed > 0 {
            info!(removed = removed, cutoff = %cutoff, "만료 캐시 정리");
        } else {
            debug!(cutoff = %cutoff, "정리할 캐시 없음");
        }
        metrics::counter!("cache_cleanup_removed_total").increment(removed);
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let now = Utc::now();
        let rows = self.store.category_stats(now).await?;
        let ttls = DataCategory::ALL
            .iter()
            .map(|c| CategoryTtl {
                category: *c,
                ttl_secs: self.config.ttl_for(*c).num_seconds(),
            })
            .collect();

        let stats = CacheStats::aggregate(self.store.kind(), rows, ttls, now);
        for category in &stats.by_category {
            metrics::gauge!("cache_entries", "category" => category.category.as_str())
                .set(category.total as f64);
        }
        Ok(stats)
    }
}

fn record_lookup(category: DataCategory, outcome: &'static str) {
    metrics::counter!(
        "cache_lookups_total",
        "category" => category.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// 실패 행에 원래 오류 종류를 남기는 접두어. 재시도 대기 중에도 같은 종류로 응답합니다.
const NO_DATA_PREFIX: &str = "no data: ";
const INVALID_INPUT_PREFIX: &str = "invalid input: ";

fn failure_message(err: &DataError) -> String {
    match err {
        DataError::NoData(detail) => format!("{}{}", NO_DATA_PREFIX, detail),
        DataError::InvalidInput(detail) => format!("{}{}", INVALID_INPUT_PREFIX, detail),
        other => other.to_string(),
    }
}

fn backoff_error(symbol: &StockSymbol, category: DataCategory, message: Option<&str>) -> DataError {
    let message = message.unwrap_or("previous fetch failed");
    if let Some(detail) = message.strip_prefix(NO_DATA_PREFIX) {
        DataError::NoData(detail.to_string())
    } else if let Some(detail) = message.strip_prefix(INVALID_INPUT_PREFIX) {
        DataError::InvalidInput(detail.to_string())
    } else {
        DataError::Upstream {
            symbol: symbol.to_string(),
            category,
            message: message.to_string(),
        }
    }
}

fn stale_warning(error: Option<&str>, fetched_at: DateTime<Utc>) -> String {
    format!(
        "upstream fetch failed: {}; serving data cached at {}",
        error.unwrap_or("unknown error"),
        fetched_at.to_rfc3339()
    )
}

fn cached<T>(data: T, entry: &CacheEntry, source: DataSource, warning: Option<String>) -> Cached<T> {
    Cached {
        data,
        source,
        fetched_at: entry.fetched_at,
        expires_at: entry.expires_at,
        warning,
    }
}
