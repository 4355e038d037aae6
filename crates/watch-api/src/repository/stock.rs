//! Stock Repository
//!
//! 관심종목/알림이 참조하는 종목 마스터 테이블.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

/// 종목 레코드
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StockRecord {
    pub id: Uuid,
    pub symbol: String,
    #[sqlx(default)]
    pub name: Option<String>,
    #[sqlx(default)]
    pub exchange: Option<String>,
    #[sqlx(default)]
    pub currency: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 종목 upsert 입력
#[derive(Debug, Clone, Default)]
pub struct NewStock<'a> {
    pub symbol: &'a str,
    pub name: Option<&'a str>,
    pub exchange: Option<&'a str>,
    pub currency: Option<&'a str>,
}

/// Stock Repository
pub struct StockRepository;

impl StockRepository {
    /// 종목을 등록하거나 기존 행의 비어 있지 않은 필드만 갱신합니다.
    pub async fn upsert(pool: &PgPool, input: NewStock<'_>) -> Result<StockRecord, sqlx::Error> {
        sqlx::query_as::<_, StockRecord>(
            r#"
            INSERT INTO stocks (symbol, name, exchange, currency)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (symbol) DO UPDATE
            SET
                name = COALESCE(EXCLUDED.name, stocks.name),
                exchange = COALESCE(EXCLUDED.exchange, stocks.exchange),
                currency = COALESCE(EXCLUDED.currency, stocks.currency),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(input.symbol)
        .bind(input.name)
        .bind(input.exchange)
        .bind(input.currency)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_symbol(
        pool: &PgPool,
        symbol: &str,
    ) -> Result<Option<StockRecord>, sqlx::Error> {
        sqlx::query_as::<_, StockRecord>("SELECT * FROM stocks WHERE symbol = $1")
            .bind(symbol)
            .fetch_optional(pool)
            .await
    }

    /// 하나 이상의 관심종목 그룹에 포함된 종목 심볼 (스크리너 기본 대상).
    pub async fn watched_symbols(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT DISTINCT s.symbol
            FROM stocks s
            INNER JOIN watchlist_stocks ws ON ws.stock_id = s.id
            ORDER BY s.symbol
            "#,
        )
        .fetch_all(pool)
        .await
    }
}
