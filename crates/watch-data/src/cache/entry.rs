//! 캐시 행과 조회 결과 타입.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use watch_core::DataCategory;

/// 캐시 한 행.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub symbol: String,
    pub category: DataCategory,
    /// 카테고리 페이로드 JSON. 한 번도 성공하지 못했으면 `Null`.
    pub data: serde_json::Value,
    /// 마지막 성공 조회 시각
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// 마지막 조회 시도 성공 여부
    pub success: bool,
    pub error_message: Option<String>,
}

impl CacheEntry {
    /// 성공한 조회 결과로 행을 만듭니다.
    pub fn fresh(
        symbol: impl Into<String>,
        category: DataCategory,
        data: serde_json::Value,
        fetched_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            category,
            data,
            fetched_at,
            expires_at,
            success: true,
            error_message: None,
        }
    }

    /// 성공 상태이며 아직 만료되지 않았는지.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.success && now < self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// 실패 후 재시도 대기 중인지 (이 기간에는 upstream을 다시 호출하지 않음).
    pub fn in_failure_backoff(&self, now: DateTime<Utc>) -> bool {
        !self.success && now < self.expires_at
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_null()
    }
}

/// 데이터 출처.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// 방금 upstream에서 조회
    Fresh,
    /// 유효한 캐시
    Cache,
    /// upstream 실패로 이전 캐시를 반환
    Stale,
}

/// 캐시 조회 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct Cached<T> {
    pub data: T,
    pub source: DataSource,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// stale 응답일 때 upstream 오류 설명
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> Cached<T> {
    pub fn is_stale(&self) -> bool {
        self.source == DataSource::Stale
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Cached<U> {
        Cached {
            data: f(self.data),
            source: self.source,
            fetched_at: self.fetched_at,
            expires_at: self.expires_at,
            warning: self.warning,
        }
    }
}

/// 카테고리별 캐시 통계.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct CategoryStats {
    pub category: DataCategory,
    pub total: u64,
    /// 성공 상태이며 만료 전
    pub fresh: u64,
    /// 만료됨 (성공/실패 무관)
    pub expired: u64,
    /// 마지막 조회 실패
    pub failed: u64,
    pub oldest_fetch: Option<DateTime<Utc>>,
    pub newest_fetch: Option<DateTime<Utc>>,
}

impl CategoryStats {
    pub fn empty(category: DataCategory) -> Self {
        Self {
            category,
            total: 0,
            fresh: 0,
            expired: 0,
            failed: 0,
            oldest_fetch: None,
            newest_fetch: None,
        }
    }
}

/// 카테고리 TTL 설정값.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct CategoryTtl {
    pub category: DataCategory,
    pub ttl_secs: i64,
}

/// 전체 캐시 통계.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct CacheStats {
    pub store: String,
    pub total_entries: u64,
    pub fresh: u64,
    pub expired: u64,
    pub failed: u64,
    /// 모든 카테고리 포함 (행이 없으면 0)
    pub by_category: Vec<CategoryStats>,
    pub ttls: Vec<CategoryTtl>,
    pub oldest_fetch: Option<DateTime<Utc>>,
    pub newest_fetch: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
}

impl CacheStats {
    /// 저장소가 반환한 카테고리 통계를 합산합니다.
    pub fn aggregate(
        store: &str,
        rows: Vec<CategoryStats>,
        ttls: Vec<CategoryTtl>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let by_category: Vec<CategoryStats> = DataCategory::ALL
            .iter()
            .map(|c| {
                rows.iter()
                    .find(|r| r.category == *c)
                    .cloned()
                    .unwrap_or_else(|| CategoryStats::empty(*c))
            })
            .collect();

        Self {
            store: store.to_string(),
            total_entries: by_category.iter().map(|c| c.total).sum(),
            fresh: by_category.iter().map(|c| c.fresh).sum(),
            expired: by_category.iter().map(|c| c.expired).sum(),
            failed: by_category.iter().map(|c| c.failed).sum(),
            oldest_fetch: by_category.iter().filter_map(|c| c.oldest_fetch).min(),
            newest_fetch: by_category.iter().filter_map(|c| c.newest_fetch).max(),
            by_category,
            ttls,
            generated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_entry_states() {
        let now = Utc::now();
        let mut entry = CacheEntry::fresh(
            "AAPL",
            DataCategory::Analyst,
            serde_json::json!({"x": 1}),
            now,
            now + Duration::hours(4),
        );
        assert!(entry.is_fresh(now));
        assert!(!entry.is_expired(now));
        assert!(entry.is_expired(now + Duration::hours(4)));

        entry.success = false;
        entry.expires_at = now + Duration::minutes(5);
        assert!(!entry.is_fresh(now));
        assert!(entry.in_failure_backoff(now));
        assert!(!entry.in_failure_backoff(now + Duration::minutes(6)));
    }

    #[test]
    fn test_stats_aggregate_fills_all_categories() {
        let now = Utc::now();
        let rows = vec![CategoryStats {
            category: DataCategory::Holders,
            total: 3,
            fresh: 2,
            expired: 1,
            failed: 1,
            oldest_fetch: Some(now - Duration::hours(20)),
            newest_fetch: Some(now),
        }];
        let stats = CacheStats::aggregate("memory", rows, Vec::new(), now);
        assert_eq!(stats.by_category.len(), 5);
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.oldest_fetch, Some(now - Duration::hours(20)));
    }
}
