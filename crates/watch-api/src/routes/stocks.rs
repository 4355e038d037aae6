//! 종목 조회 API.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/stocks/search?q=` - 종목 검색
//! - `GET /api/v1/stocks/{symbol}/quote` - 현재 시세
//! - `GET /api/v1/stocks/{symbol}/history?period=` - OHLCV
//! - `GET /api/v1/stocks/{symbol}/extended` - 기본 지표 (1시간 캐시)
//! - `GET /api/v1/stocks/{symbol}/dividends` - 배당/분할 (24시간)
//! - `GET /api/v1/stocks/{symbol}/calendar` - 실적 일정 (6시간)
//! - `GET /api/v1/stocks/{symbol}/analyst` - 애널리스트 (4시간)
//! - `GET /api/v1/stocks/{symbol}/holders` - 보유 현황 (12시간)
//! - `GET /api/v1/stocks/{symbol}/overview` - 다섯 카테고리 일괄
//! - `GET /api/v1/stocks/{symbol}/metrics` - 파생 지표
//!
//! 캐시된 응답은 `source`, `fetched_at`, `expires_at`, `stale`, `warning`을 포함합니다.
//! upstream 실패로 이전 데이터를 반환하는 경우 `Warning: 110` 헤더를 추가합니다.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};
use watch_analytics::{
    performance_deltas, relative_performance, MetricsOptions, ProfileMode, RelativePerformance,
    StockMetrics,
};
use watch_core::{DataCategory, Period, PricePoint, Quote, SymbolMatch};
use watch_data::{
    AnalystData, CalendarData, Cached, DataSource, DividendsSplits, ExtendedData, HoldersData,
    StockOverview,
};

use super::parse_symbol;
use crate::error::{bad_request, data_error, watch_error, ApiResult};
use crate::state::AppState;

const STALE_WARNING: &str = "110 - \"Response is Stale\"";

// ================================================================================================
// Request/Response Types
// ================================================================================================

/// 캐시된 카테고리 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct CachedResponse<T> {
    pub symbol: String,
    pub category: DataCategory,
    pub data: T,
    pub source: DataSource,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// upstream 실패로 이전 데이터를 반환했는지
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> CachedResponse<T> {
    pub fn new(symbol: &str, category: DataCategory, cached: Cached<T>) -> Self {
        let stale = cached.is_stale();
        Self {
            symbol: symbol.to_string(),
            category,
            data: cached.data,
            source: cached.source,
            fetched_at: cached.fetched_at,
            expires_at: cached.expires_at,
            stale,
            warning: cached.warning,
        }
    }
}

impl<T: Serialize> IntoResponse for CachedResponse<T> {
    fn into_response(self) -> Response {
        let stale = self.stale;
        let mut response = Json(self).into_response();
        if stale {
            response
                .headers_mut()
                .insert(header::WARNING, HeaderValue::from_static(STALE_WARNING));
        }
        response
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// 검색어 (티커 또는 회사명)
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    10
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SymbolMatch>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PeriodQuery {
    /// 조회 기간 (1d, 5d, 1mo, 3mo, 6mo, ytd, 1y, 2y, 5y, max). 기본 1y
    pub period: Option<String>,
}

impl PeriodQuery {
    pub(crate) fn period(&self) -> ApiResult<Period> {
        match &self.period {
            Some(raw) => raw.parse().map_err(watch_error),
            None => Ok(Period::default()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub symbol: String,
    pub period: Period,
    /// 봉 간격 (5m, 15m, 1d, 1wk)
    pub interval: String,
    pub points: Vec<PricePoint>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MetricsQuery {
    pub period: Option<String>,
    /// 볼륨 프로파일 구간 수 (기본 20)
    pub bins: Option<usize>,
    /// 볼륨 분배 방식 (range | close)
    pub mode: Option<ProfileMode>,
    /// 스파크라인 점 개수 (기본 50)
    pub sparkline_points: Option<usize>,
    /// 상대 성과 비교용 벤치마크 (예: ^GSPC)
    pub benchmark: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MetricsResponse {
    pub symbol: String,
    pub period: Period,
    pub metrics: StockMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relative: Vec<RelativePerformance>,
}

// ================================================================================================
// Handlers
// ================================================================================================

/// 종목 검색.
#[utoipa::path(
    get,
    path = "/api/v1/stocks/search",
    params(SearchQuery),
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, description = "검색어 없음", body = crate::error::ApiErrorResponse)
    ),
    tag = "stocks"
)]
pub async fn search_stocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(bad_request("query parameter 'q' is required"));
    }
    let limit = query.limit.clamp(1, 50);

    let results = state.provider.search(q, limit).await.map_err(data_error)?;
    debug!(query = q, count = results.len(), "종목 검색");

    Ok(Json(SearchResponse {
        query: q.to_string(),
        results,
    }))
}

/// 현재 시세.
#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/quote",
    params(("symbol" = String, Path, description = "종목 심볼")),
    responses(
        (status = 200, body = Quote),
        (status = 404, body = crate::error::ApiErrorResponse)
    ),
    tag = "stocks"
)]
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Quote>> {
    let symbol = parse_symbol(&symbol)?;
    let quote = state.quotes.get(&symbol).await.map_err(data_error)?;
    Ok(Json(quote))
}

/// 가격 이력.
#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/history",
    params(("symbol" = String, Path, description = "종목 심볼"), PeriodQuery),
    responses(
        (status = 200, body = HistoryResponse),
        (status = 400, body = crate::error::ApiErrorResponse)
    ),
    tag = "stocks"
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let symbol = parse_symbol(&symbol)?;
    let period = query.period()?;
    let points = state
        .provider
        .history(&symbol, period)
        .await
        .map_err(data_error)?;

    Ok(Json(HistoryResponse {
        symbol: symbol.to_string(),
        period,
        interval: period.interval().to_string(),
        points,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/extended",
    params(("symbol" = String, Path, description = "종목 심볼")),
    responses(
        (status = 200, body = CachedResponse<ExtendedData>),
        (status = 502, description = "upstream 실패, 캐시 없음", body = crate::error::ApiErrorResponse)
    ),
    tag = "stocks"
)]
pub async fn get_extended(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<CachedResponse<ExtendedData>> {
    let symbol = parse_symbol(&symbol)?;
    let cached = state.cache.extended(&symbol).await.map_err(data_error)?;
    Ok(CachedResponse::new(symbol.as_str(), DataCategory::Extended, cached))
}

#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/dividends",
    params(("symbol" = String, Path, description = "종목 심볼")),
    responses(
        (status = 200, body = CachedResponse<DividendsSplits>),
        (status = 502, body = crate::error::ApiErrorResponse)
    ),
    tag = "stocks"
)]
pub async fn get_dividends(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<CachedResponse<DividendsSplits>> {
    let symbol = parse_symbol(&symbol)?;
    let cached = state
        .cache
        .dividends_splits(&symbol)
        .await
        .map_err(data_error)?;
    Ok(CachedResponse::new(
        symbol.as_str(),
        DataCategory::DividendsSplits,
        cached,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/calendar",
    params(("symbol" = String, Path, description = "종목 심볼")),
    responses(
        (status = 200, body = CachedResponse<CalendarData>),
        (status = 502, body = crate::error::ApiErrorResponse)
    ),
    tag = "stocks"
)]
pub async fn get_calendar(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<CachedResponse<CalendarData>> {
    let symbol = parse_symbol(&symbol)?;
    let cached = state.cache.calendar(&symbol).await.map_err(data_error)?;
    Ok(CachedResponse::new(symbol.as_str(), DataCategory::Calendar, cached))
}

#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/analyst",
    params(("symbol" = String, Path, description = "종목 심볼")),
    responses(
        (status = 200, body = CachedResponse<AnalystData>),
        (status = 502, body = crate::error::ApiErrorResponse)
    ),
    tag = "stocks"
)]
pub async fn get_analyst(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<CachedResponse<AnalystData>> {
    let symbol = parse_symbol(&symbol)?;
    let cached = state.cache.analyst(&symbol).await.map_err(data_error)?;
    Ok(CachedResponse::new(symbol.as_str(), DataCategory::Analyst, cached))
}

#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/holders",
    params(("symbol" = String, Path, description = "종목 심볼")),
    responses(
        (status = 200, body = CachedResponse<HoldersData>),
        (status = 502, body = crate::error::ApiErrorResponse)
    ),
    tag = "stocks"
)]
pub async fn get_holders(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<CachedResponse<HoldersData>> {
    let symbol = parse_symbol(&symbol)?;
    let cached = state.cache.holders(&symbol).await.map_err(data_error)?;
    Ok(CachedResponse::new(symbol.as_str(), DataCategory::Holders, cached))
}

/// 다섯 카테고리 일괄 조회.
///
/// 카테고리별로 독립 처리되며 실패한 카테고리는 `error`만 채워집니다.
#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/overview",
    params(("symbol" = String, Path, description = "종목 심볼")),
    responses((status = 200, body = StockOverview)),
    tag = "stocks"
)]
pub async fn get_overview(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Response> {
    let symbol = parse_symbol(&symbol)?;
    let overview = state.cache.overview(&symbol).await;
    let stale = overview.has_stale();

    let mut response = Json(overview).into_response();
    if stale {
        response
            .headers_mut()
            .insert(header::WARNING, HeaderValue::from_static(STALE_WARNING));
    }
    Ok(response)
}

/// 파생 지표 (낙폭, 성과, 스파크라인, 볼륨 프로파일, 피보나치).
#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/metrics",
    params(("symbol" = String, Path, description = "종목 심볼"), MetricsQuery),
    responses(
        (status = 200, body = MetricsResponse),
        (status = 400, body = crate::error::ApiErrorResponse)
    ),
    tag = "stocks"
)]
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<MetricsQuery>,
) -> ApiResult<Json<MetricsResponse>> {
    let symbol = parse_symbol(&symbol)?;
    let period = PeriodQuery {
        period: query.period.clone(),
    }
    .period()?;

    let defaults = MetricsOptions::default();
    let options = MetricsOptions {
        profile_bins: query.bins.unwrap_or(defaults.profile_bins).clamp(1, 200),
        profile_mode: query.mode.unwrap_or(defaults.profile_mode),
        sparkline_points: query
            .sparkline_points
            .unwrap_or(defaults.sparkline_points)
            .clamp(2, 500),
        ..defaults
    };

    let series = state
        .provider
        .history(&symbol, period)
        .await
        .map_err(data_error)?;
    let as_of = series.last().map(|p| p.time).unwrap_or_else(Utc::now);
    let metrics = StockMetrics::compute(&series, as_of, &options);

    let relative = match &query.benchmark {
        Some(raw) => {
            let benchmark = parse_symbol(raw)?;
            let bench_series = state
                .provider
                .history(&benchmark, period)
                .await
                .map_err(data_error)?;
            relative_performance(&metrics.performance, &performance_deltas(&bench_series, as_of))
        }
        None => Vec::new(),
    };

    Ok(Json(MetricsResponse {
        symbol: symbol.to_string(),
        period,
        metrics,
        benchmark: query.benchmark,
        relative,
    }))
}

// ================================================================================================
// Router
// ================================================================================================

pub fn stocks_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/search", get(search_stocks))
        .route("/{symbol}/quote", get(get_quote))
        .route("/{symbol}/history", get(get_history))
        .route("/{symbol}/extended", get(get_extended))
        .route("/{symbol}/dividends", get(get_dividends))
        .route("/{symbol}/calendar", get(get_calendar))
        .route("/{symbol}/analyst", get(get_analyst))
        .route("/{symbol}/holders", get(get_holders))
        .route("/{symbol}/overview", get(get_overview))
        .route("/{symbol}/metrics", get(get_metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use rust_decimal_macros::dec;
    use tower::ServiceExt;
    use watch_data::testing::{daily_series, MockMarketDataProvider};

    use crate::state::create_test_state_with;

    fn app(provider: Arc<MockMarketDataProvider>) -> Router {
        Router::new()
            .nest("/api/v1/stocks", stocks_router())
            .with_state(Arc::new(create_test_state_with(provider)))
    }

    async fn get(app: &Router, uri: &str) -> Response {
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_quote() {
        let provider = Arc::new(MockMarketDataProvider::new().with_quote("AAPL", dec!(190), dec!(185)));
        let app = app(provider);

        let response = get(&app, "/api/v1/stocks/aapl/quote").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["symbol"], "AAPL");
    }

    #[tokio::test]
    async fn test_invalid_symbol_is_bad_request() {
        let app = app(Arc::new(MockMarketDataProvider::new()));
        let response = get(&app, "/api/v1/stocks/$$$/quote").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let app = app(Arc::new(MockMarketDataProvider::new()));
        let response = get(&app, "/api/v1/stocks/search?q=").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_extended_served_from_cache_on_second_call() {
        let provider = Arc::new(MockMarketDataProvider::new());
        let app = app(Arc::clone(&provider));

        let first = json(get(&app, "/api/v1/stocks/AAPL/extended").await).await;
        assert_eq!(first["source"], "fresh");
        assert_eq!(first["stale"], false);

        let second = json(get(&app, "/api/v1/stocks/AAPL/extended").await).await;
        assert_eq!(second["source"], "cache");
        assert_eq!(provider.calls(DataCategory::Extended), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_without_cache_is_bad_gateway() {
        let provider = Arc::new(MockMarketDataProvider::new());
        provider.fail_category(DataCategory::Analyst, true);
        let app = app(provider);

        let response = get(&app, "/api/v1/stocks/AAPL/analyst").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json(response).await["code"], "UPSTREAM_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_stale_response_has_warning_header() {
        let provider = Arc::new(MockMarketDataProvider::new());
        let state = Arc::new(create_test_state_with(Arc::clone(&provider)));
        let symbol = parse_symbol("AAPL").unwrap();

        // 만료된 성공 데이터를 심어둔 뒤 upstream 실패
        let now = Utc::now();
        let entry = watch_data::CacheEntry::fresh(
            "AAPL",
            DataCategory::Holders,
            serde_json::to_value(HoldersData::default()).unwrap(),
            now - chrono::Duration::hours(20),
            now - chrono::Duration::hours(8),
        );
        state.cache.store().upsert(&entry).await.unwrap();
        provider.fail_category(DataCategory::Holders, true);

        let app = Router::new()
            .nest("/api/v1/stocks", stocks_router())
            .with_state(Arc::clone(&state));
        let response = get(&app, &format!("/api/v1/stocks/{}/holders", symbol)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::WARNING).is_some());
        let body = json(response).await;
        assert_eq!(body["stale"], true);
        assert_eq!(body["source"], "stale");
        assert!(body["warning"].is_string());
    }

    #[tokio::test]
    async fn test_overview_isolates_failures() {
        let provider = Arc::new(MockMarketDataProvider::new());
        provider.fail_category(DataCategory::Calendar, true);
        let app = app(provider);

        let body = json(get(&app, "/api/v1/stocks/MSFT/overview").await).await;
        assert!(body["calendar"]["error"].is_string());
        assert!(body["extended"]["result"].is_object());
    }

    #[tokio::test]
    async fn test_metrics_with_options() {
        let closes: Vec<_> = (0..60).map(|i| rust_decimal::Decimal::from(100 + i % 7)).collect();
        let provider = Arc::new(
            MockMarketDataProvider::new()
                .with_history("AAPL", daily_series(&closes))
                .with_history("^GSPC", daily_series(&closes)),
        );
        let app = app(provider);

        let response = get(
            &app,
            "/api/v1/stocks/AAPL/metrics?period=3mo&bins=10&sparkline_points=20&benchmark=%5EGSPC",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["period"], "3mo");
        assert_eq!(body["metrics"]["points"], 60);
        assert_eq!(
            body["metrics"]["volume_profile"]["price_levels"].as_array().unwrap().len(),
            10
        );
        assert_eq!(body["metrics"]["sparkline"]["points"].as_array().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_unknown_period_rejected() {
        let app = app(Arc::new(MockMarketDataProvider::new()));
        let response = get(&app, "/api/v1/stocks/AAPL/history?period=7w").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
