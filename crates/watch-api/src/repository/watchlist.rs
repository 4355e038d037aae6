//! Watchlist Repository
//!
//! 관심종목 그룹과 그룹-종목 연결 테이블 연산을 담당합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// ================================================================================================
// Types
// ================================================================================================

/// 관심종목 그룹 레코드
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct WatchlistRecord {
    pub id: Uuid,
    pub name: String,
    #[sqlx(default)]
    pub description: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 관심종목 그룹 + 종목 수
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct WatchlistWithCount {
    pub id: Uuid,
    pub name: String,
    #[sqlx(default)]
    pub description: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stock_count: i64,
}

/// 그룹에 포함된 종목 (stocks 조인)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct WatchlistStockRecord {
    pub watchlist_id: Uuid,
    pub stock_id: Uuid,
    pub symbol: String,
    #[sqlx(default)]
    pub name: Option<String>,
    #[sqlx(default)]
    pub exchange: Option<String>,
    #[sqlx(default)]
    pub note: Option<String>,
    pub sort_order: i32,
    /// 추가 시점 가격
    #[sqlx(default)]
    pub added_price: Option<Decimal>,
    pub added_at: DateTime<Utc>,
}

/// 새 관심종목 그룹 입력
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewWatchlist {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

/// 그룹 수정 입력 (지정한 필드만 변경)
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateWatchlist {
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// 그룹에 종목 추가 입력
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewWatchlistStock {
    #[validate(length(min = 1, max = 15))]
    pub symbol: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub note: Option<String>,
    /// 지정하지 않으면 현재가를 기록합니다.
    #[serde(default)]
    pub added_price: Option<Decimal>,
}

// ================================================================================================
// Repository
// ================================================================================================

/// Watchlist Repository
pub struct WatchlistRepository;

impl WatchlistRepository {
    /// 모든 관심종목 그룹 조회 (종목 수 포함)
    pub async fn get_all_watchlists(pool: &PgPool) -> Result<Vec<WatchlistWithCount>, sqlx::Error> {
        sqlx::query_as::<_, WatchlistWithCount>(
            r#"
            SELECT
                w.id, w.name, w.description, w.sort_order,
                w.created_at, w.updated_at,
                COUNT(ws.stock_id) AS stock_count
            FROM watchlists w
            LEFT JOIN watchlist_stocks ws ON w.id = ws.watchlist_id
            GROUP BY w.id
            ORDER BY w.sort_order, w.name
            "#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn get_watchlist_by_id(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<WatchlistRecord>, sqlx::Error> {
        sqlx::query_as::<_, WatchlistRecord>("SELECT * FROM watchlists WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// 관심종목 그룹 생성 (정렬 순서는 마지막)
    pub async fn create_watchlist(
        pool: &PgPool,
        input: &NewWatchlist,
    ) -> Result<WatchlistRecord, sqlx::Error> {
        let max_order: Option<i32> = sqlx::query_scalar("SELECT MAX(sort_order) FROM watchlists")
            .fetch_one(pool)
            .await?;

        sqlx::query_as::<_, WatchlistRecord>(
            r#"
            INSERT INTO watchlists (name, description, sort_order)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(max_order.unwrap_or(-1) + 1)
        .fetch_one(pool)
        .await
    }

    pub async fn update_watchlist(
        pool: &PgPool,
        id: Uuid,
        input: &UpdateWatchlist,
    ) -> Result<Option<WatchlistRecord>, sqlx::Error> {
        sqlx::query_as::<_, WatchlistRecord>(
            r#"
            UPDATE watchlists
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                sort_order = COALESCE($4, sort_order),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.sort_order)
        .fetch_optional(pool)
        .await
    }

    /// 그룹 삭제 (CASCADE로 연결 행도 삭제됨)
    pub async fn delete_watchlist(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM watchlists WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================================================================
    // Watchlist Stock Operations
    // ============================================================================================

    /// 그룹 내 모든 종목 조회
    pub async fn get_stocks(
        pool: &PgPool,
        watchlist_id: Uuid,
    ) -> Result<Vec<WatchlistStockRecord>, sqlx::Error> {
        sqlx::query_as::<_, WatchlistStockRecord>(
            r#"
            SELECT
                ws.watchlist_id, ws.stock_id, s.symbol, s.name, s.exchange,
                ws.note, ws.sort_order, ws.added_price, ws.added_at
            FROM watchlist_stocks ws
            INNER JOIN stocks s ON s.id = ws.stock_id
            WHERE ws.watchlist_id = $1
            ORDER BY ws.sort_order, ws.added_at
            "#,
        )
        .bind(watchlist_id)
        .fetch_all(pool)
        .await
    }

    /// 그룹 내 종목 심볼 목록
    pub async fn get_symbols(pool: &PgPool, watchlist_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT s.symbol
            FROM watchlist_stocks ws
            INNER JOIN stocks s ON s.id = ws.stock_id
            WHERE ws.watchlist_id = $1
            ORDER BY ws.sort_order, ws.added_at
            "#,
        )
        .bind(watchlist_id)
        .fetch_all(pool)
        .await
    }

    /// 종목 추가. 이미 있으면 메모만 갱신합니다.
    pub async fn add_stock(
        pool: &PgPool,
        watchlist_id: Uuid,
        stock_id: Uuid,
        note: Option<&str>,
        added_price: Option<Decimal>,
    ) -> Result<(), sqlx::Error> {
        let max_order: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(sort_order) FROM watchlist_stocks WHERE watchlist_id = $1",
        )
        .bind(watchlist_id)
        .fetch_one(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO watchlist_stocks (watchlist_id, stock_id, note, added_price, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (watchlist_id, stock_id) DO UPDATE
            SET note = COALESCE(EXCLUDED.note, watchlist_stocks.note)
            "#,
        )
        .bind(watchlist_id)
        .bind(stock_id)
        .bind(note)
        .bind(added_price)
        .bind(max_order.unwrap_or(-1) + 1)
        .execute(pool)
        .await?;

        sqlx::query("UPDATE watchlists SET updated_at = NOW() WHERE id = $1")
            .bind(watchlist_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// 심볼로 종목 제거
    pub async fn remove_stock(
        pool: &PgPool,
        watchlist_id: Uuid,
        symbol: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM watchlist_stocks ws
            USING stocks s
            WHERE ws.stock_id = s.id AND ws.watchlist_id = $1 AND s.symbol = $2
            "#,
        )
        .bind(watchlist_id)
        .bind(symbol)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_watchlist_validation() {
        let ok: NewWatchlist = serde_json::from_str(r#"{"name": "Tech"}"#).unwrap();
        assert!(ok.validate().is_ok());

        let empty: NewWatchlist = serde_json::from_str(r#"{"name": ""}"#).unwrap();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_update_watchlist_partial() {
        let update: UpdateWatchlist = serde_json::from_str(r#"{"sort_order": 3}"#).unwrap();
        assert!(update.name.is_none());
        assert_eq!(update.sort_order, Some(3));
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_new_stock_symbol_length() {
        let long: NewWatchlistStock =
            serde_json::from_str(r#"{"symbol": "ABCDEFGHIJKLMNOPQ"}"#).unwrap();
        assert!(long.validate().is_err());
    }
}
