//! PostgreSQL 캐시 저장소.
//!
//! 테이블: `extended_data_cache (symbol, category)` 기본키, `data JSONB`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use watch_core::DataCategory;

use super::{CacheEntry, CacheStore, CategoryStats};
use crate::error::Result;

#[derive(Debug, FromRow)]
struct CacheRow {
    symbol: String,
    category: String,
    data: Option<serde_json::Value>,
    fetched_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    success: bool,
    error_message: Option<String>,
}

impl CacheRow {
    fn into_entry(self) -> Option<CacheEntry> {
        let category = match self.category.parse::<DataCategory>() {
            Ok(c) => c,
            Err(_) => {
                warn!(symbol = %self.symbol, category = %self.category, "알 수 없는 캐시 카테고리, 무시");
                return None;
            }
        };

        Some(CacheEntry {
            symbol: self.symbol,
            category,
            data: self.data.unwrap_or(serde_json::Value::Null),
            fetched_at: self.fetched_at,
            expires_at: self.expires_at,
            success: self.success,
            error_message: self.error_message,
        })
    }
}

#[derive(Debug, FromRow)]
struct StatsRow {
    category: String,
    total: i64,
    fresh: i64,
    expired: i64,
    failed: i64,
    oldest_fetch: Option<DateTime<Utc>>,
    newest_fetch: Option<DateTime<Utc>>,
}

/// PostgreSQL 기반 [`CacheStore`].
#[derive(Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, symbol: &str, category: DataCategory) -> Result<Option<CacheEntry>> {
        let row = sqlx::query_as::<_, CacheRow>(
            r#"
            SELECT symbol, category, data, fetched_at, expires_at, success, error_message
            FROM extended_data_cache
            WHERE symbol = $1 AND category = $2
            "#,
        )
        .bind(symbol)
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(CacheRow::into_entry))
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO extended_data_cache
                (symbol, category, data, fetched_at, expires_at, success, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (symbol, category) DO UPDATE SET
                data = EXCLUDED.data,
                fetched_at = EXCLUDED.fetched_at,
                expires_at = EXCLUDED.expires_at,
                success = EXCLUDED.success,
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(&entry.symbol)
        .bind(entry.category.as_str())
        .bind((!entry.data.is_null()).then_some(&entry.data))
        .bind(entry.fetched_at)
        .bind(entry.expires_at)
        .bind(entry.success)
        .bind(&entry.error_message)
        .execute(&self.pool)
        .await?;

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
        sqlx::query(
            r#"
            INSERT INTO extended_data_cache
                (symbol, category, data, fetched_at, expires_at, success, error_message)
            VALUES ($1, $2, NULL, $3, $4, FALSE, $5)
            ON CONFLICT (symbol, category) DO UPDATE SET
                expires_at = EXCLUDED.expires_at,
                success = FALSE,
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(symbol)
        .bind(category.as_str())
        .bind(now)
        .bind(retry_at)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn invalidate(&self, symbol: &str, category: Option<DataCategory>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM extended_data_cache
            WHERE symbol = $1 AND ($2::TEXT IS NULL OR category = $2)
            "#,
        )
        .bind(symbol)
        .bind(category.map(|c| c.as_str()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn invalidate_category(&self, category: DataCategory) -> Result<u64> {
        let result = sqlx::query("DELETE FROM extended_data_cache WHERE category = $1")
            .bind(category.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn invalidate_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM extended_data_cache")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM extended_data_cache WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn category_stats(&self, now: DateTime<Utc>) -> Result<Vec<CategoryStats>> {
        let rows = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                category,
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE success AND expires_at > $1) AS fresh,
                COUNT(*) FILTER (WHERE expires_at <= $1) AS expired,
                COUNT(*) FILTER (WHERE NOT success) AS failed,
                MIN(fetched_at) AS oldest_fetch,
                MAX(fetched_at) AS newest_fetch
            FROM extended_data_cache
            GROUP BY category
            ORDER BY category
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let category = r.category.parse::<DataCategory>().ok()?;
                Some(CategoryStats {
                    category,
                    total: r.total as u64,
                    fresh: r.fresh as u64,
                    expired: r.expired as u64,
                    failed: r.failed as u64,
                    oldest_fetch: r.oldest_fetch,
                    newest_fetch: r.newest_fetch,
                })
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
