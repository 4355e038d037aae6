//! Watchlist API 라우트
//!
//! 관심종목 그룹 관리 API를 제공합니다.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/watchlists` - 모든 그룹 조회
//! - `POST /api/v1/watchlists` - 새 그룹 생성
//! - `GET /api/v1/watchlists/{id}` - 그룹 상세 (종목 포함)
//! - `PUT /api/v1/watchlists/{id}` - 그룹 수정
//! - `DELETE /api/v1/watchlists/{id}` - 그룹 삭제
//! - `POST /api/v1/watchlists/{id}/stocks` - 종목 추가
//! - `DELETE /api/v1/watchlists/{id}/stocks/{symbol}` - 종목 제거
//! - `GET /api/v1/watchlists/{id}/quotes` - 그룹 종목 시세
//! - `GET /api/v1/watchlists/{id}/earnings?days=30` - 다가오는 실적 발표

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;
use watch_core::{Quote, StockSymbol};

use super::{parse_symbol, require_db, SuccessResponse};
use crate::error::{db_error, not_found, validation_error, ApiResult};
use crate::repository::{
    NewStock, NewWatchlist, NewWatchlistStock, StockRepository, UpdateWatchlist, WatchlistRecord,
    WatchlistRepository, WatchlistStockRecord, WatchlistWithCount,
};
use crate::state::AppState;

// ================================================================================================
// Request/Response Types
// ================================================================================================

/// 관심종목 그룹 목록 응답
#[derive(Debug, Serialize, ToSchema)]
pub struct WatchlistListResponse {
    pub watchlists: Vec<WatchlistWithCount>,
    pub total: usize,
}

/// 관심종목 그룹 상세 응답 (종목 포함)
#[derive(Debug, Serialize, ToSchema)]
pub struct WatchlistDetailResponse {
    #[serde(flatten)]
    pub watchlist: WatchlistRecord,
    pub stocks: Vec<WatchlistStockRecord>,
    pub stock_count: usize,
}

/// 종목 추가 요청
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddStocksRequest {
    pub stocks: Vec<NewWatchlistStock>,
}

/// 종목 추가 응답
#[derive(Debug, Serialize, ToSchema)]
pub struct AddStocksResponse {
    pub added: Vec<WatchlistStockRecord>,
    pub count: usize,
}

/// 그룹 종목 시세. 조회에 실패한 종목은 `error`만 채워집니다.
#[derive(Debug, Serialize, ToSchema)]
pub struct WatchlistQuote {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    /// 추가 시점 대비 수익률 (%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_added_pct: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WatchlistQuotesResponse {
    pub watchlist_id: Uuid,
    pub quotes: Vec<WatchlistQuote>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EarningsQuery {
    /// 조회 범위 (일, 기본 30)
    #[serde(default = "default_earnings_days")]
    pub days: i64,
}

fn default_earnings_days() -> i64 {
    30
}

/// 실적 발표 예정.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EarningsEntry {
    pub symbol: String,
    pub date: NaiveDate,
    pub days_until: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eps_estimate: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_estimate: Option<Decimal>,
    /// 캐시 데이터가 stale이었는지
    pub stale: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EarningsResponse {
    pub watchlist_id: Uuid,
    pub days: i64,
    /// 날짜 오름차순
    pub earnings: Vec<EarningsEntry>,
    /// 일정 조회에 실패한 종목
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

// ================================================================================================
// Handlers
// ================================================================================================

async fn find_watchlist(pool: &PgPool, id: Uuid) -> ApiResult<WatchlistRecord> {
    WatchlistRepository::get_watchlist_by_id(pool, id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| not_found(format!("Watchlist {} not found", id)))
}

/// 모든 관심종목 그룹 조회
#[utoipa::path(
    get,
    path = "/api/v1/watchlists",
    responses(
        (status = 200, body = WatchlistListResponse),
        (status = 503, description = "DB 미설정", body = crate::error::ApiErrorResponse)
    ),
    tag = "watchlists"
)]
pub async fn list_watchlists(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<WatchlistListResponse>> {
    let pool = require_db(&state)?;
    let watchlists = WatchlistRepository::get_all_watchlists(pool)
        .await
        .map_err(db_error)?;
    let total = watchlists.len();

    Ok(Json(WatchlistListResponse { watchlists, total }))
}

/// 새 관심종목 그룹 생성
#[utoipa::path(
    post,
    path = "/api/v1/watchlists",
    request_body = NewWatchlist,
    responses(
        (status = 201, body = WatchlistRecord),
        (status = 400, body = crate::error::ApiErrorResponse),
        (status = 409, description = "이름 중복", body = crate::error::ApiErrorResponse)
    ),
    tag = "watchlists"
)]
pub async fn create_watchlist(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewWatchlist>,
) -> ApiResult<(StatusCode, Json<WatchlistRecord>)> {
    input.validate().map_err(validation_error)?;
    let pool = require_db(&state)?;

    let watchlist = WatchlistRepository::create_watchlist(pool, &input)
        .await
        .map_err(db_error)?;
    info!(id = %watchlist.id, name = %watchlist.name, "관심종목 그룹 생성");

    Ok((StatusCode::CREATED, Json(watchlist)))
}

/// 그룹 상세 조회
#[utoipa::path(
    get,
    path = "/api/v1/watchlists/{id}",
    params(("id" = Uuid, Path, description = "그룹 ID")),
    responses(
        (status = 200, body = WatchlistDetailResponse),
        (status = 404, body = crate::error::ApiErrorResponse)
    ),
    tag = "watchlists"
)]
pub async fn get_watchlist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WatchlistDetailResponse>> {
    let pool = require_db(&state)?;
    let watchlist = find_watchlist(pool, id).await?;
    let stocks = WatchlistRepository::get_stocks(pool, id)
        .await
        .map_err(db_error)?;
    let stock_count = stocks.len();

    Ok(Json(WatchlistDetailResponse {
        watchlist,
        stocks,
        stock_count,
    }))
}

/// 그룹 수정
#[utoipa::path(
    put,
    path = "/api/v1/watchlists/{id}",
    params(("id" = Uuid, Path, description = "그룹 ID")),
    request_body = UpdateWatchlist,
    responses(
        (status = 200, body = WatchlistRecord),
        (status = 404, body = crate::error::ApiErrorResponse)
    ),
    tag = "watchlists"
)]
pub async fn update_watchlist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateWatchlist>,
) -> ApiResult<Json<WatchlistRecord>> {
    input.validate().map_err(validation_error)?;
    let pool = require_db(&state)?;

    let updated = WatchlistRepository::update_watchlist(pool, id, &input)
        .await
        .map_err(db_error)?
        .ok_or_else(|| not_found(format!("Watchlist {} not found", id)))?;

    Ok(Json(updated))
}

/// 그룹 삭제 (포함된 종목 연결도 함께 삭제)
#[utoipa::path(
    delete,
    path = "/api/v1/watchlists/{id}",
    params(("id" = Uuid, Path, description = "그룹 ID")),
    responses(
        (status = 200, body = SuccessResponse),
        (status = 404, body = crate::error::ApiErrorResponse)
    ),
    tag = "watchlists"
)]
pub async fn delete_watchlist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse>> {
    let pool = require_db(&state)?;

    if !WatchlistRepository::delete_watchlist(pool, id)
        .await
        .map_err(db_error)?
    {
        return Err(not_found(format!("Watchlist {} not found", id)));
    }
    info!(id = %id, "관심종목 그룹 삭제");

    Ok(Json(SuccessResponse::ok("Watchlist deleted")))
}

/// 종목 추가.
///
/// 종목 마스터에 없으면 시세를 조회해 이름/거래소와 함께 등록합니다.
/// `added_price`를 생략하면 현재가를 기록합니다.
#[utoipa::path(
    post,
    path = "/api/v1/watchlists/{id}/stocks",
    params(("id" = Uuid, Path, description = "그룹 ID")),
    request_body = AddStocksRequest,
    responses(
        (status = 201, body = AddStocksResponse),
        (status = 400, body = crate::error::ApiErrorResponse),
        (status = 404, body = crate::error::ApiErrorResponse)
    ),
    tag = "watchlists"
)]
pub async fn add_stocks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddStocksRequest>,
) -> ApiResult<(StatusCode, Json<AddStocksResponse>)> {
    for stock in &request.stocks {
        stock.validate().map_err(validation_error)?;
    }
    let symbols: Vec<StockSymbol> = request
        .stocks
        .iter()
        .map(|s| parse_symbol(&s.symbol))
        .collect::<ApiResult<_>>()?;

    let pool = require_db(&state)?;
    find_watchlist(pool, id).await?;

    for (input, symbol) in request.stocks.iter().zip(&symbols) {
        let quote = match state.quotes.get(symbol).await {
            Ok(q) => Some(q),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "종목 추가 시 시세 조회 실패");
                None
            }
        };

        let stock = StockRepository::upsert(
            pool,
            NewStock {
                symbol: symbol.as_str(),
                name: quote.as_ref().and_then(|q| q.name.as_deref()),
                exchange: quote.as_ref().and_then(|q| q.exchange.as_deref()),
                currency: quote.as_ref().and_then(|q| q.currency.as_deref()),
            },
        )
        .await
        .map_err(db_error)?;

        let added_price = input.added_price.or(quote.as_ref().map(|q| q.price));
        WatchlistRepository::add_stock(pool, id, stock.id, input.note.as_deref(), added_price)
            .await
            .map_err(db_error)?;
    }

    let wanted: Vec<&str> = symbols.iter().map(StockSymbol::as_str).collect();
    let added: Vec<WatchlistStockRecord> = WatchlistRepository::get_stocks(pool, id)
        .await
        .map_err(db_error)?
        .into_iter()
        .filter(|s| wanted.contains(&s.symbol.as_str()))
        .collect();
    let count = added.len();
    info!(watchlist_id = %id, count, "관심종목 추가");

    Ok((StatusCode::CREATED, Json(AddStocksResponse { added, count })))
}

/// 종목 제거
#[utoipa::path(
    delete,
    path = "/api/v1/watchlists/{id}/stocks/{symbol}",
    params(
        ("id" = Uuid, Path, description = "그룹 ID"),
        ("symbol" = String, Path, description = "종목 심볼")
    ),
    responses(
        (status = 200, body = SuccessResponse),
        (status = 404, body = crate::error::ApiErrorResponse)
    ),
    tag = "watchlists"
)]
pub async fn remove_stock(
    State(state): State<Arc<AppState>>,
    Path((id, symbol)): Path<(Uuid, String)>,
) -> ApiResult<Json<SuccessResponse>> {
    let symbol = parse_symbol(&symbol)?;
    let pool = require_db(&state)?;

    if !WatchlistRepository::remove_stock(pool, id, symbol.as_str())
        .await
        .map_err(db_error)?
    {
        return Err(not_found(format!("{} is not in watchlist {}", symbol, id)));
    }

    Ok(Json(SuccessResponse::ok(format!("{} removed", symbol))))
}

/// 그룹 종목 시세 일괄 조회
#[utoipa::path(
    get,
    path = "/api/v1/watchlists/{id}/quotes",
    params(("id" = Uuid, Path, description = "그룹 ID")),
    responses(
        (status = 200, body = WatchlistQuotesResponse),
        (status = 404, body = crate::error::ApiErrorResponse)
    ),
    tag = "watchlists"
)]
pub async fn get_watchlist_quotes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WatchlistQuotesResponse>> {
    let pool = require_db(&state)?;
    find_watchlist(pool, id).await?;
    let stocks = WatchlistRepository::get_stocks(pool, id)
        .await
        .map_err(db_error)?;

    let mut quotes = Vec::with_capacity(stocks.len());
    for stock in &stocks {
        quotes.push(quote_entry(&state, stock).await);
    }

    Ok(Json(WatchlistQuotesResponse {
        watchlist_id: id,
        quotes,
    }))
}

async fn quote_entry(state: &AppState, stock: &WatchlistStockRecord) -> WatchlistQuote {
    let result = match StockSymbol::parse(&stock.symbol) {
        Ok(symbol) => state.quotes.get(&symbol).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match result {
        Ok(quote) => WatchlistQuote {
            symbol: stock.symbol.clone(),
            since_added_pct: since_added_pct(stock.added_price, quote.price),
            quote: Some(quote),
            error: None,
        },
        Err(error) => WatchlistQuote {
            symbol: stock.symbol.clone(),
            quote: None,
            since_added_pct: None,
            error: Some(error),
        },
    }
}

fn since_added_pct(added_price: Option<Decimal>, price: Decimal) -> Option<Decimal> {
    let base = added_price.filter(|p| !p.is_zero())?;
    Some(((price - base) / base * Decimal::ONE_HUNDRED).round_dp(2))
}

/// 다가오는 실적 발표.
///
/// 실적 일정은 calendar 캐시(6시간)에서 읽습니다.
#[utoipa::path(
    get,
    path = "/api/v1/watchlists/{id}/earnings",
    params(("id" = Uuid, Path, description = "그룹 ID"), EarningsQuery),
    responses(
        (status = 200, body = EarningsResponse),
        (status = 404, body = crate::error::ApiErrorResponse)
    ),
    tag = "watchlists"
)]
pub async fn get_watchlist_earnings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<EarningsQuery>,
) -> ApiResult<Json<EarningsResponse>> {
    let days = query.days.clamp(1, 365);
    let pool = require_db(&state)?;
    find_watchlist(pool, id).await?;
    let symbols = WatchlistRepository::get_symbols(pool, id)
        .await
        .map_err(db_error)?;

    let today = Utc::now().date_naive();
    let mut earnings = Vec::new();
    let mut failed = Vec::new();

    for raw in symbols {
        let Ok(symbol) = StockSymbol::parse(&raw) else {
            failed.push(raw);
            continue;
        };
        match state.cache.calendar(&symbol).await {
            Ok(cached) => {
                let stale = cached.is_stale();
                if let Some(date) = cached.data.next_earnings(today) {
                    earnings.push(EarningsEntry {
                        symbol: raw,
                        date,
                        days_until: (date - today).num_days(),
                        eps_estimate: cached.data.earnings_average,
                        revenue_estimate: cached.data.revenue_average,
                        stale,
                    });
                }
            }
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "실적 일정 조회 실패");
                failed.push(raw);
            }
        }
    }

    let earnings = upcoming_within(earnings, today, days);

    Ok(Json(EarningsResponse {
        watchlist_id: id,
        days,
        earnings,
        failed,
    }))
}

/// `days` 이내 일정만 남기고 날짜순으로 정렬합니다.
fn upcoming_within(mut entries: Vec<EarningsEntry>, today: NaiveDate, days: i64) -> Vec<EarningsEntry> {
    let until = today + Duration::days(days);
    entries.retain(|e| e.date >= today && e.date <= until);
    entries.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));
    entries
}

// ================================================================================================
// Router
// ================================================================================================

pub fn watchlists_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_watchlists).post(create_watchlist))
        .route(
            "/{id}",
            get(get_watchlist)
                .put(update_watchlist)
                .delete(delete_watchlist),
        )
        .route("/{id}/stocks", post(add_stocks))
        .route("/{id}/stocks/{symbol}", delete(remove_stock))
        .route("/{id}/quotes", get(get_watchlist_quotes))
        .route("/{id}/earnings", get(get_watchlist_earnings))
}
