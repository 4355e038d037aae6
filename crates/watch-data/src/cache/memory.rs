//! 프로세스 내 캐시 저장소.
//!
//! 데이터베이스가 설정되지 않았을 때와 테스트에서 사용합니다.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use watch_core::DataCategory;

use super::{CacheEntry, CacheStore, CategoryStats};
use crate::error::Result;

type Key = (String, DataCategory);

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<Key, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, symbol: &str, category: DataCategory) -> Result<Option<CacheEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&(symbol.to_string(), category))
            .cloned())
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        self.entries
            .write()
            .await
            .insert((entry.symbol.clone(), entry.category), entry.clone());
        Ok(())
    }

    async fn record_failure(
        &self,
        symbol: &str,
        category: DataCategory,
        error: &str,
        now: DateTime<Utc>,
        retry_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry((symbol.to_string(), category))
            .or_insert_with(|| CacheEntry {
                symbol: symbol.to_string(),
                category,
                data: serde_json::Value::Null,
                fetched_at: now,
                expires_at: retry_at,
                success: false,
                error_message: None,
            });

        entry.success = false;
        entry.error_message = Some(error.to_string());
        entry.expires_at = retry_at;
        Ok(())
    }

    async fn invalidate(&self, symbol: &str, category: Option<DataCategory>) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(s, c), _| !(s == symbol && category.map_or(true, |cat| cat == *c)));
        Ok((before - entries.len()) as u64)
    }

    async fn invalidate_category(&self, category: DataCategory) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(_, c), _| *c != category);
        Ok((before - entries.len()) as u64)
    }

    async fn invalidate_all(&self) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let count = entries.len() as u64;
        entries.clear();
        Ok(count)
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }

    async fn category_stats(&self, now: DateTime<Utc>) -> Result<Vec<CategoryStats>> {
        let entries = self.entries.read().await;
        let mut stats: HashMap<DataCategory, CategoryStats> = HashMap::new();

        for entry in entries.values() {
            let s = stats
                .entry(entry.category)
                .or_insert_with(|| CategoryStats::empty(entry.category));
            s.total += 1;
            if entry.is_fresh(now) {
                s.fresh += 1;
            }
            if entry.is_expired(now) {
                s.expired += 1;
            }
            if !entry.success {
                s.failed += 1;
            }
            s.oldest_fetch = Some(s.oldest_fetch.map_or(entry.fetched_at, |t| t.min(entry.fetched_at)));
            s.newest_fetch = Some(s.newest_fetch.map_or(entry.fetched_at, |t| t.max(entry.fetched_at)));
        }

        let mut rows: Vec<CategoryStats> = stats.into_values().collect();
        rows.sort_by_key(|s| s.category);
        Ok(rows)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn entry(symbol: &str, category: DataCategory, expires_at: DateTime<Utc>) -> CacheEntry {
        CacheEntry::fresh(symbol, category, json!({"v": 1}), Utc::now(), expires_at)
    }

    #[tokio::test]
    async fn test_record_failure_keeps_previous_data() {
        let store = MemoryCacheStore::new();
        let now = Utc::now();
        store
            .upsert(&entry("AAPL", DataCategory::Calendar, now - Duration::minutes(1)))
            .await
            .unwrap();

        store
            .record_failure("AAPL", DataCategory::Calendar, "HTTP 503", now, now + Duration::minutes(5))
            .await
            .unwrap();

        let row = store.get("AAPL", DataCategory::Calendar).await.unwrap().unwrap();
        assert!(!row.success);
        assert_eq!(row.data, json!({"v": 1}));
        assert_eq!(row.error_message.as_deref(), Some("HTTP 503"));
        assert_eq!(row.expires_at, now + Duration::minutes(5));
    }

    #[tokio::test]
    async fn test_upsert_stores_failure_state_as_given() {
        let store = MemoryCacheStore::new();
        let mut failed = entry("TSLA", DataCategory::Analyst, Utc::now() + Duration::minutes(5));
        failed.success = false;
        failed.error_message = Some("upstream timeout".to_string());
        store.upsert(&failed).await.unwrap();

        let row = store.get("TSLA", DataCategory::Analyst).await.unwrap().unwrap();
        assert_eq!(row, failed);
        assert!(row.in_failure_backoff(Utc::now()));
    }

    #[tokio::test]
    async fn test_record_failure_without_row_creates_empty_entry() {
        let store = MemoryCacheStore::new();
        let now = Utc::now();
        store
            .record_failure("MSFT", DataCategory::Holders, "timeout", now, now + Duration::minutes(5))
            .await
            .unwrap();

        let row = store.get("MSFT", DataCategory::Holders).await.unwrap().unwrap();
        assert!(!row.has_data());
    }

    #[tokio::test]
    async fn test_invalidate_scopes() {
        let store = MemoryCacheStore::new();
        let later = Utc::now() + Duration::hours(1);
        for category in DataCategory::ALL {
            store.upsert(&entry("AAPL", category, later)).await.unwrap();
            store.upsert(&entry("MSFT", category, later)).await.unwrap();
        }

        assert_eq!(store.invalidate("AAPL", Some(DataCategory::Analyst)).await.unwrap(), 1);
        assert_eq!(store.invalidate("AAPL", None).await.unwrap(), 4);
        assert_eq!(store.invalidate_category(DataCategory::Holders).await.unwrap(), 1);
        assert_eq!(store.invalidate_all().await.unwrap(), 4);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_expired_before_and_stats() {
        let store = MemoryCacheStore::new();
        let now = Utc::now();
        store
            .upsert(&entry("OLD", DataCategory::Extended, now - Duration::days(10)))
            .await
            .unwrap();
        store
            .upsert(&entry("RECENT", DataCategory::Extended, now - Duration::hours(1)))
            .await
            .unwrap();
        store
            .upsert(&entry("LIVE", DataCategory::Extended, now + Duration::hours(1)))
            .await
            .unwrap();

        let stats = store.category_stats(now).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total, 3);
        assert_eq!(stats[0].fresh, 1);
        assert_eq!(stats[0].expired, 2);

        let removed = store.delete_expired_before(now - Duration::days(7)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 2);
    }
}
