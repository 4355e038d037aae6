//! 종목 스크리너 API.
//!
//! # 엔드포인트
//!
//! - `POST /api/v1/screener` - 필터/정렬 적용
//! - `GET /api/v1/screener/presets` - 프리셋 목록
//! - `GET /api/v1/screener/presets/{name}` - 프리셋 조회
//!
//! 대상 종목은 `symbols` → `watchlist_id` → 전체 관심종목 순으로 결정합니다.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use watch_analytics::{
    preset, presets, screen, ScreenerFilter, ScreenerPreset, ScreenerSort, ScreenerSortField,
    StockSnapshot,
};
use watch_core::StockSymbol;

use super::{parse_symbol, require_db};
use crate::error::{bad_request, db_error, not_found, ApiResult};
use crate::repository::{StockRepository, WatchlistRepository};
use crate::state::AppState;

/// 한 번에 스크리닝할 수 있는 최대 종목 수
const MAX_UNIVERSE: usize = 200;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ScreenerRequest {
    /// 지정하면 프리셋의 필터를 사용합니다.
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub filter: Option<ScreenerFilter>,
    #[serde(default)]
    pub sort: Option<ScreenerSort>,
    #[serde(default)]
    pub limit: Option<usize>,
    /// 대상 종목
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
    /// 대상 관심종목 그룹
    #[serde(default)]
    pub watchlist_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScreenerResponse {
    /// 평가한 종목 수
    pub universe: usize,
    pub matched: usize,
    pub results: Vec<StockSnapshot>,
    /// 시세 조회에 실패해 제외된 종목
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PresetListResponse {
    pub presets: Vec<ScreenerPreset>,
}

fn sort_needs_extended(sort: Option<&ScreenerSort>) -> bool {
    matches!(
        sort.map(|s| s.field),
        Some(ScreenerSortField::MarketCap | ScreenerSortField::Pe | ScreenerSortField::DividendYield)
    )
}

/// 요청에서 대상 종목을 결정합니다. 중복은 제거됩니다.
async fn resolve_universe(
    state: &AppState,
    request: &ScreenerRequest,
) -> ApiResult<Vec<StockSymbol>> {
    let raw: Vec<String> = if let Some(symbols) = &request.symbols {
        symbols.clone()
    } else if let Some(id) = request.watchlist_id {
        let pool = require_db(state)?;
        WatchlistRepository::get_watchlist_by_id(pool, id)
            .await
            .map_err(db_error)?
            .ok_or_else(|| not_found(format!("Watchlist {} not found", id)))?;
        WatchlistRepository::get_symbols(pool, id)
            .await
            .map_err(db_error)?
    } else {
        let pool = require_db(state)?;
        StockRepository::watched_symbols(pool)
            .await
            .map_err(db_error)?
    };

    let unique: BTreeSet<StockSymbol> = raw
        .iter()
        .map(|s| parse_symbol(s))
        .collect::<ApiResult<_>>()?;
    if unique.len() > MAX_UNIVERSE {
        return Err(bad_request(format!(
            "screener universe is limited to {} symbols",
            MAX_UNIVERSE
        )));
    }
    Ok(unique.into_iter().collect())
}

/// 종목 하나의 스냅샷. 시세가 없으면 `None`입니다.
///
/// 확장 데이터/애널리스트 데이터는 필요할 때만 캐시에서 읽으며,
/// 실패해도 해당 값만 비운 채 진행합니다.
async fn build_snapshot(
    state: &AppState,
    symbol: &StockSymbol,
    with_extended: bool,
    with_analyst: bool,
) -> Option<StockSnapshot> {
    let quote = match state.quotes.get(symbol).await {
        Ok(q) => q,
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "스크리너 시세 조회 실패");
            return None;
        }
    };
    let mut snapshot = StockSnapshot::new(quote);

    if with_extended {
        match state.cache.extended(symbol).await {
            Ok(cached) => snapshot.extended = Some(cached.data),
            Err(e) => debug!(symbol = %symbol, error = %e, "확장 데이터 없음"),
        }
    }
    if with_analyst {
        match state.cache.analyst(symbol).await {
            Ok(cached) => snapshot.consensus_score = cached.data.consensus_score(),
            Err(e) => debug!(symbol = %symbol, error = %e, "애널리스트 데이터 없음"),
        }
    }

    Some(snapshot)
}

#[utoipa::path(
    post,
    path = "/api/v1/screener",
    request_body = ScreenerRequest,
    responses(
        (status = 200, body = ScreenerResponse),
        (status = 400, body = crate::error::ApiErrorResponse),
        (status = 404, description = "프리셋/그룹 없음", body = crate::error::ApiErrorResponse)
    ),
    tag = "screener"
)]
pub async fn run_screener(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScreenerRequest>,
) -> ApiResult<Json<ScreenerResponse>> {
    let (filter, sort) = match &request.preset {
        Some(name) => {
            let p = preset(name).ok_or_else(|| not_found(format!("Unknown preset: {}", name)))?;
            (request.filter.clone().unwrap_or(p.filter), request.sort.or(Some(p.sort)))
        }
        None => (request.filter.clone().unwrap_or_default(), request.sort),
    };

    let universe = resolve_universe(&state, &request).await?;
    let with_extended = filter.needs_extended() || sort_needs_extended(sort.as_ref());
    let with_analyst = filter.needs_analyst();

    let snapshots = join_all(
        universe
            .iter()
            .map(|symbol| build_snapshot(&state, symbol, with_extended, with_analyst)),
    )
    .await;

    let mut skipped = Vec::new();
    let mut collected = Vec::with_capacity(universe.len());
    for (symbol, snapshot) in universe.iter().zip(snapshots) {
        match snapshot {
            Some(s) => collected.push(s),
            None => skipped.push(symbol.to_string()),
        }
    }

    let results = screen(collected, &filter, sort.as_ref(), request.limit);
    debug!(
        universe = universe.len(),
        matched = results.len(),
        "스크리너 실행"
    );

    Ok(Json(ScreenerResponse {
        universe: universe.len(),
        matched: results.len(),
        results,
        skipped,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/screener/presets",
    responses((status = 200, body = PresetListResponse)),
    tag = "screener"
)]
pub async fn list_presets() -> Json<PresetListResponse> {
    Json(PresetListResponse { presets: presets() })
}

#[utoipa::path(
    get,
    path = "/api/v1/screener/presets/{name}",
    params(("name" = String, Path, description = "프리셋 이름")),
    responses(
        (status = 200, body = ScreenerPreset),
        (status = 404, body = crate::error::ApiErrorResponse)
    ),
    tag = "screener"
)]
pub async fn get_preset(Path(name): Path<String>) -> ApiResult<Json<ScreenerPreset>> {
    preset(&name)
        .map(Json)
        .ok_or_else(|| not_found(format!("Unknown preset: {}", name)))
}

pub fn screener_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(run_screener))
        .route("/presets", get(list_presets))
        .route("/presets/{name}", get(get_preset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode, response::Response};
    use rust_decimal_macros::dec;
    use tower::ServiceExt;
    use watch_data::testing::MockMarketDataProvider;
    use watch_data::ExtendedData;

    use crate::state::{create_test_state, create_test_state_with};

    async fn post_json(state: AppState, body: &str) -> Response {
        Router::new()
            .nest("/api/v1/screener", screener_router())
            .with_state(Arc::new(state))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/screener")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
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
    async fn test_explicit_symbols_without_database() {
        let response = post_json(
            create_test_state(),
            r#"{"symbols": ["AAPL", "MSFT", "NOPE"], "filter": {"min_price": "200"}}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["universe"], 3);
        assert_eq!(body["matched"], 1);
        assert_eq!(body["results"][0]["quote"]["symbol"], "MSFT");
        assert_eq!(body["skipped"][0], "NOPE");
    }

    #[tokio::test]
    async fn test_default_universe_requires_database() {
        let response = post_json(create_test_state(), "{}").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_extended_filter_uses_cache() {
        let provider = Arc::new(
            MockMarketDataProvider::new()
                .with_quote("AAPL", dec!(190), dec!(185))
                .with_quote("KO", dec!(60), dec!(59)),
        );
        provider.set_payload(
            "KO",
            &ExtendedData {
                dividend_yield: Some(dec!(3.1)),
                ..Default::default()
            },
        );
        let state = create_test_state_with(Arc::clone(&provider));

        let response = post_json(
            state,
            r#"{"symbols": ["AAPL", "KO"], "filter": {"min_dividend_yield": "2.5"}}"#,
        )
        .await;
        let body = json(response).await;

        assert_eq!(body["matched"], 1);
        assert_eq!(body["results"][0]["quote"]["symbol"], "KO");
        assert_eq!(provider.calls(watch_core::DataCategory::Extended), 2);
    }

    #[tokio::test]
    async fn test_unknown_preset() {
        let response = post_json(create_test_state(), r#"{"preset": "moonshot", "symbols": ["AAPL"]}"#).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_presets() {
        let app = Router::new()
            .nest("/api/v1/screener", screener_router())
            .with_state(Arc::new(create_test_state()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/screener/presets/dividend")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["name"], "dividend");
    }
}
