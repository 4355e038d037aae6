//! 헬스 체크 endpoint.
//!
//! - `GET /health` - liveness
//! - `GET /health/ready` - DB, 캐시 저장소, 시세 제공자, 알림 폴러 상태
//!
//! DB가 설정되지 않은 경우는 장애가 아니라 메모리 캐시 모드로 봅니다.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::state::AppState;

/// 전체 서비스 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Healthy,
    /// 캐시 저장소 장애 (upstream 직접 조회로 응답은 가능)
    Degraded,
    /// 설정된 DB에 연결할 수 없음
    Unhealthy,
}

/// 컴포넌트 하나의 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Up,
    Down,
    NotConfigured,
    Disabled,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentStatus {
    pub status: ComponentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    fn new(status: ComponentState, message: Option<String>) -> Self {
        Self { status, message }
    }

    pub fn is_up(&self) -> bool {
        self.status == ComponentState::Up
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub database: ComponentStatus,
    /// 확장 데이터 캐시 저장소 (message: postgres | memory)
    pub cache_store: ComponentStatus,
    /// 시세 제공자 (message: 제공자 이름)
    pub provider: ComponentStatus,
    /// 15분 주기 알림 폴러
    pub alert_poller: ComponentStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: ServiceStatus,
    pub version: String,
    pub uptime_secs: i64,
    /// ISO 8601
    pub timestamp: String,
    /// 메모리 시세 캐시 항목 수
    pub cached_quotes: usize,
    pub components: ComponentHealth,
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "서버 응답 가능", body = String)),
    tag = "health"
)]
pub async fn health_check() -> &'static str {
    "OK"
}

async fn database_status(state: &AppState) -> ComponentStatus {
    if !state.has_db() {
        return ComponentStatus::new(ComponentState::NotConfigured, None);
    }
    if state.is_db_healthy().await {
        ComponentStatus::new(ComponentState::Up, None)
    } else {
        ComponentStatus::new(ComponentState::Down, Some("연결 실패".to_string()))
    }
}

fn alert_poller_status(state: &AppState) -> ComponentStatus {
    if !state.config.alerts.enabled {
        ComponentStatus::new(ComponentState::Disabled, None)
    } else if !state.has_db() {
        ComponentStatus::new(
            ComponentState::NotConfigured,
            Some("database required".to_string()),
        )
    } else {
        let minutes = state.config.alerts.poll_interval_secs / 60;
        ComponentStatus::new(ComponentState::Up, Some(format!("every {}m", minutes)))
    }
}

/// 상세 헬스 체크 (readiness).
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "정상 또는 일부 저하", body = HealthResponse),
        (status = 503, description = "DB 장애", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_status(&state).await;

    let store_kind = state.cache.store().kind();
    let cache_store = if state.is_cache_store_healthy().await {
        ComponentStatus::new(ComponentState::Up, Some(store_kind.to_string()))
    } else {
        ComponentStatus::new(ComponentState::Down, Some(format!("{} 저장소 응답 없음", store_kind)))
    };

    let status = if database.status == ComponentState::Down {
        ServiceStatus::Unhealthy
    } else if !cache_store.is_up() {
        ServiceStatus::Degraded
    } else {
        ServiceStatus::Healthy
    };
    let code = match status {
        ServiceStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    let response = HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        cached_quotes: state.quotes.len().await,
        components: ComponentHealth {
            database,
            cache_store,
            provider: ComponentStatus::new(
                ComponentState::Up,
                Some(state.provider.name().to_string()),
            ),
            alert_poller: alert_poller_status(&state),
        },
    };

    (code, Json(response))
}

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;
    use watch_core::StockSymbol;

    use crate::state::create_test_state;

    async fn ready(state: AppState) -> (StatusCode, serde_json::Value) {
        let app = health_router().with_state(Arc::new(state));
        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_liveness() {
        let response = health_router()
            .with_state(Arc::new(create_test_state()))
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_in_memory_mode() {
        let state = create_test_state();
        state
            .quotes
            .get(&StockSymbol::parse("AAPL").unwrap())
            .await
            .unwrap();

        let (status, body) = ready(state).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["cached_quotes"], 1);
        assert_eq!(body["components"]["database"]["status"], "not_configured");
        assert_eq!(body["components"]["cache_store"]["message"], "memory");
        assert_eq!(body["components"]["provider"]["message"], "mock");
        assert_eq!(body["components"]["alert_poller"]["status"], "not_configured");
    }

    #[tokio::test]
    async fn test_ready_reports_disabled_poller() {
        let mut state = create_test_state();
        let mut config = (*state.config).clone();
        config.alerts.enabled = false;
        state.config = Arc::new(config);

        let (_, body) = ready(state).await;
        assert_eq!(body["components"]["alert_poller"]["status"], "disabled");
    }
}
