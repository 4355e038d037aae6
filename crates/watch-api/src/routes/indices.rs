//! 시장 지수 API.
//!
//! - `GET /api/v1/indices` - 설정된 지수의 현재 시세
//! - `GET /api/v1/indices/{symbol}/history?period=` - 지수 차트

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;
use watch_core::{Quote, StockSymbol};

use super::parse_symbol;
use super::stocks::{HistoryResponse, PeriodQuery};
use crate::error::{data_error, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct IndexQuote {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IndicesResponse {
    pub indices: Vec<IndexQuote>,
}

/// 설정된 지수 시세. 실패한 지수는 `error`만 채워집니다.
#[utoipa::path(
    get,
    path = "/api/v1/indices",
    responses((status = 200, body = IndicesResponse)),
    tag = "indices"
)]
pub async fn list_indices(State(state): State<Arc<AppState>>) -> Json<IndicesResponse> {
    let mut symbols = Vec::new();
    let mut indices = Vec::new();
    for raw in &state.config.indices.symbols {
        match StockSymbol::parse(raw) {
            Ok(symbol) => symbols.push(symbol),
            Err(e) => {
                warn!(symbol = %raw, error = %e, "잘못된 지수 심볼 설정");
                indices.push(IndexQuote {
                    symbol: raw.clone(),
                    quote: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    for (symbol, result) in state.quotes.get_many(&symbols).await {
        indices.push(match result {
            Ok(quote) => IndexQuote {
                symbol: symbol.to_string(),
                quote: Some(quote),
                error: None,
            },
            Err(e) => IndexQuote {
                symbol: symbol.to_string(),
                quote: None,
                error: Some(e.to_string()),
            },
        });
    }

    Json(IndicesResponse { indices })
}

#[utoipa::path(
    get,
    path = "/api/v1/indices/{symbol}/history",
    params(("symbol" = String, Path, description = "지수 심볼 (예: ^GSPC)"), PeriodQuery),
    responses(
        (status = 200, body = HistoryResponse),
        (status = 400, body = crate::error::ApiErrorResponse)
    ),
    tag = "indices"
)]
pub async fn get_index_history(
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

pub fn indices_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_indices))
        .route("/{symbol}/history", get(get_index_history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use crate::state::create_test_state;

    #[tokio::test]
    async fn test_list_configured_indices() {
        let app = Router::new()
            .nest("/api/v1/indices", indices_router())
            .with_state(Arc::new(create_test_state()));

        let response = app
            .oneshot(Request::builder().uri("/api/v1/indices").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["indices"][0]["symbol"], "^GSPC");
        assert!(body["indices"][0]["quote"].is_object());
    }
}
