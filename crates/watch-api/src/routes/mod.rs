//! API 라우트 모듈.
//!
//! 모든 REST 엔드포인트는 `/api/v1` 아래에 마운트됩니다.

pub mod alerts;
pub mod cache;
pub mod health;
pub mod indices;
pub mod screener;
pub mod stocks;
pub mod watchlists;

pub use alerts::alerts_router;
pub use cache::cache_router;
pub use health::{
    health_router, ComponentHealth, ComponentState, ComponentStatus, HealthResponse, ServiceStatus,
};
pub use indices::indices_router;
pub use screener::screener_router;
pub use stocks::{stocks_router, CachedResponse};
pub use watchlists::watchlists_router;

use axum::Router;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::ToSchema;
use watch_core::StockSymbol;

use crate::error::{database_unavailable, watch_error, ApiResult};
use crate::state::AppState;

/// 단순 성공 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// 경로/본문의 심볼 문자열을 검증합니다.
pub(crate) fn parse_symbol(raw: &str) -> ApiResult<StockSymbol> {
    StockSymbol::parse(raw).map_err(watch_error)
}

/// DB가 필요한 핸들러용.
pub(crate) fn require_db(state: &AppState) -> ApiResult<&PgPool> {
    state.db_pool.as_ref().ok_or_else(database_unavailable)
}

/// API 라우터 생성.
///
/// 헬스 체크는 로드밸런서용 `/health`와 `/api/v1/health` 두 곳에 마운트합니다.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/health", health_router())
        .nest("/api/v1/watchlists", watchlists_router())
        .nest("/api/v1/stocks", stocks_router())
        .nest("/api/v1/alerts", alerts_router())
        .nest("/api/v1/screener", screener_router())
        .nest("/api/v1/indices", indices_router())
        .nest("/api/v1/cache", cache_router())
}
