//! OpenAPI 문서화 설정.
//!
//! utoipa로 REST API의 OpenAPI 3.0 문서를 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `paths(...)`에 추가 (경로에서 참조한 스키마는 자동 등록)
//!
//! 도메인 crate의 타입은 `utoipa-support` feature로 `ToSchema`를 구현합니다.

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiErrorResponse;
use crate::routes::{
    alerts, cache, health, indices, screener, stocks, watchlists, ComponentHealth,
    ComponentState, ComponentStatus, HealthResponse, ServiceStatus, SuccessResponse,
};

/// Stockwatch API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockwatch API",
        description = r#"
# Stockwatch REST API

관심종목, 시세, 확장 데이터, 가격 알림을 위한 REST API입니다.

## 주요 기능

- **관심종목**: 그룹 관리, 그룹 시세, 실적 발표 일정
- **종목**: 검색, 시세, 차트, 확장 데이터, 파생 지표
- **알림**: 가격/변동률 알림 (15분 주기 평가)
- **스크리너**: 필터/정렬, 프리셋
- **캐시**: 카테고리별 TTL 캐시 통계와 무효화

## 캐시 응답

확장 데이터 응답은 `source` (fresh | cache | stale)와 `stale` 플래그를 포함합니다.
upstream 장애로 이전 데이터를 반환하면 `Warning: 110` 헤더가 추가됩니다.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    servers((url = "/", description = "Current server")),
    tags(
        (name = "health", description = "헬스 체크"),
        (name = "watchlists", description = "관심종목 그룹"),
        (name = "stocks", description = "종목 시세와 확장 데이터"),
        (name = "alerts", description = "가격 알림"),
        (name = "screener", description = "종목 스크리너"),
        (name = "indices", description = "시장 지수"),
        (name = "cache", description = "캐시 관리"),
    ),
    components(schemas(
        ApiErrorResponse,
        SuccessResponse,
        HealthResponse,
        ServiceStatus,
        ComponentHealth,
        ComponentState,
        ComponentStatus,
    )),
    paths(
        health::health_check,
        health::health_ready,
        watchlists::list_watchlists,
        watchlists::create_watchlist,
        watchlists::get_watchlist,
        watchlists::update_watchlist,
        watchlists::delete_watchlist,
        watchlists::add_stocks,
        watchlists::remove_stock,
        watchlists::get_watchlist_quotes,
        watchlists::get_watchlist_earnings,
        stocks::search_stocks,
        stocks::get_quote,
        stocks::get_history,
        stocks::get_extended,
        stocks::get_dividends,
        stocks::get_calendar,
        stocks::get_analyst,
        stocks::get_holders,
        stocks::get_overview,
        stocks::get_metrics,
        alerts::list_alerts,
        alerts::create_alert,
        alerts::get_alert,
        alerts::update_alert,
        alerts::delete_alert,
        alerts::run_alert_check,
        alerts::list_events,
        screener::run_screener,
        screener::list_presets,
        screener::get_preset,
        indices::list_indices,
        indices::get_index_history,
        cache::cache_stats,
        cache::invalidate,
        cache::invalidate_symbol,
        cache::cleanup,
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터.
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_valid() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&spec).unwrap();

        assert!(json.contains("Stockwatch API"));

        for tag in ["health", "watchlists", "stocks", "alerts", "screener", "indices", "cache"] {
            assert!(json.contains(tag), "missing tag {}", tag);
        }

        assert!(json.contains("/health/ready"));
        assert!(json.contains("/api/v1/watchlists/{id}/earnings"));
        assert!(json.contains("/api/v1/stocks/{symbol}/extended"));
        assert!(json.contains("/api/v1/alerts/check"));
        assert!(json.contains("/api/v1/cache/invalidate"));
    }

    #[test]
    fn test_openapi_contains_schemas() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();

        assert!(json.contains("HealthResponse"));
        assert!(json.contains("ApiErrorResponse"));
        assert!(json.contains("AlertRule"));
        assert!(json.contains("CacheStats"));
        assert!(json.contains("ScreenerFilter"));
    }

    #[test]
    fn test_swagger_ui_router_creates() {
        let _router: Router<()> = swagger_ui_router();
    }
}
