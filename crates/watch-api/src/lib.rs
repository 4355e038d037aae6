//! 관심종목 REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API (관심종목, 종목, 알림, 스크리너, 지수, 캐시)
//! - 가격 알림 폴러와 캐시 정리 백그라운드 태스크
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`repository`]: PostgreSQL 접근
//! - [`tasks`]: 백그라운드 태스크
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod state;
pub mod tasks;

pub use error::{ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use openapi::{swagger_ui_router, ApiDoc};
pub use routes::create_api_router;
pub use state::AppState;
pub use tasks::{start_alert_poller, start_cache_janitor, AlertPollerConfig};

#[cfg(any(test, feature = "test-utils"))]
pub use state::{create_test_state, create_test_state_with};
