//! 확장 데이터 캐시 관리 API.
//!
//! - `GET /api/v1/cache/stats` - 카테고리별 통계와 TTL
//! - `POST /api/v1/cache/invalidate` - 종목/카테고리 단위 무효화
//! - `DELETE /api/v1/cache/{symbol}` - 종목 전체 무효화
//! - `POST /api/v1/cache/cleanup` - 보관 기간이 지난 행 삭제

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use watch_core::DataCategory;
use watch_data::CacheStats;

use super::parse_symbol;
use crate::error::{data_error, ApiResult};
use crate::state::AppState;
use crate::tasks::run_cleanup;

/// 무효화 요청. 둘 다 생략하면 전체 캐시를 비웁니다.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub category: Option<DataCategory>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvalidateResponse {
    /// 삭제된 캐시 행 수
    pub removed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<DataCategory>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CleanupResponse {
    pub removed_rows: u64,
    pub removed_quotes: usize,
}

#[utoipa::path(
    get,
    path = "/api/v1/cache/stats",
    responses(
        (status = 200, body = CacheStats),
        (status = 503, body = crate::error::ApiErrorResponse)
    ),
    tag = "cache"
)]
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<CacheStats>> {
    let stats = state.cache.stats().await.map_err(data_error)?;
    Ok(Json(stats))
}

#[utoipa::path(
    post,
    path = "/api/v1/cache/invalidate",
    request_body = InvalidateRequest,
    responses(
        (status = 200, body = InvalidateResponse),
        (status = 400, body = crate::error::ApiErrorResponse)
    ),
    tag = "cache"
)]
pub async fn invalidate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InvalidateRequest>,
) -> ApiResult<Json<InvalidateResponse>> {
    let symbol = request.symbol.as_deref().map(parse_symbol).transpose()?;

    let removed = match (&symbol, request.category) {
        (Some(symbol), category) => state.cache.invalidate(symbol, category).await,
        (None, Some(category)) => state.cache.invalidate_category(category).await,
        (None, None) => state.cache.invalidate_all().await,
    }
    .map_err(data_error)?;

    info!(
        symbol = ?symbol.as_ref().map(|s| s.as_str()),
        category = ?request.category,
        removed,
        "캐시 무효화"
    );

    Ok(Json(InvalidateResponse {
        removed,
        symbol: symbol.map(String::from),
        category: request.category,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cache/{symbol}",
    params(("symbol" = String, Path, description = "종목 심볼")),
    responses((status = 200, body = InvalidateResponse)),
    tag = "cache"
)]
pub async fn invalidate_symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<InvalidateResponse>> {
    let symbol = parse_symbol(&symbol)?;
    let removed = state
        .cache
        .invalidate(&symbol, None)
        .await
        .map_err(data_error)?;

    Ok(Json(InvalidateResponse {
        removed,
        symbol: Some(symbol.into()),
        category: None,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/cache/cleanup",
    responses((status = 200, body = CleanupResponse)),
    tag = "cache"
)]
pub async fn cleanup(State(state): State<Arc<AppState>>) -> ApiResult<Json<CleanupResponse>> {
    let (removed_rows, removed_quotes) = run_cleanup(&state).await.map_err(data_error)?;
    Ok(Json(CleanupResponse {
        removed_rows,
        removed_quotes,
    }))
}

pub fn cache_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(cache_stats))
        .route("/invalidate", post(invalidate))
        .route("/cleanup", post(cleanup))
        .route("/{symbol}", delete(invalidate_symbol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode, response::Response};
    use tower::ServiceExt;

    use crate::state::create_test_state;

    fn request(method: &str, uri: &str, body: Option<&str>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_stats_lists_every_category() {
        let app = Router::new()
            .nest("/api/v1/cache", cache_router())
            .with_state(Arc::new(create_test_state()));

        let response = app.oneshot(request("GET", "/api/v1/cache/stats", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["store"], "memory");
        assert_eq!(body["by_category"].as_array().unwrap().len(), 5);
        assert_eq!(body["ttls"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_invalidate_symbol_category() {
        let state = Arc::new(create_test_state());
        let symbol = parse_symbol("AAPL").unwrap();
        state.cache.extended(&symbol).await.unwrap();
        state.cache.analyst(&symbol).await.unwrap();

        let app = Router::new()
            .nest("/api/v1/cache", cache_router())
            .with_state(Arc::clone(&state));

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/v1/cache/invalidate",
                Some(r#"{"symbol": "aapl", "category": "analyst"}"#),
            ))
            .await
            .unwrap();
        let body = json(response).await;
        assert_eq!(body["removed"], 1);
        assert_eq!(body["symbol"], "AAPL");

        let response = app
            .oneshot(request("DELETE", "/api/v1/cache/AAPL", None))
            .await
            .unwrap();
        assert_eq!(json(response).await["removed"], 1);
    }

    #[tokio::test]
    async fn test_cleanup_on_empty_cache() {
        let app = Router::new()
            .nest("/api/v1/cache", cache_router())
            .with_state(Arc::new(create_test_state()));

        let response = app
            .oneshot(request("POST", "/api/v1/cache/cleanup", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["removed_rows"], 0);
    }
}
