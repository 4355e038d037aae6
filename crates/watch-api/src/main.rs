//! 관심종목 API 서버.
//!
//! 설정을 로드하고 DB/시세 제공자를 연결한 뒤 Axum 서버와 백그라운드 태스크를 시작합니다.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use axum::{http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use watch_api::metrics::setup_metrics_recorder;
use watch_api::middleware::metrics_layer;
use watch_api::openapi::swagger_ui_router;
use watch_api::repository::run_migrations;
use watch_api::routes::create_api_router;
use watch_api::state::AppState;
use watch_api::tasks::{start_alert_poller, start_cache_janitor, AlertPollerConfig};
use watch_core::{init_logging, AppConfig, DatabaseConfig, LogConfig, ServerConfig};
use watch_data::YahooMarketDataProvider;

/// CORS 레이어 생성.
///
/// `server.cors_origins`가 비어 있으면 개발 모드로 간주하여 모든 origin을 허용합니다.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let (allow_origin, restricted) = if origins.is_empty() {
        if !config.cors_origins.is_empty() {
            warn!("cors_origins에 유효한 origin이 없어 모든 origin 허용");
        } else {
            warn!("cors_origins not set, allowing any origin (development mode)");
        }
        (AllowOrigin::any(), false)
    } else {
        info!("CORS configured with {} allowed origins", origins.len());
        (AllowOrigin::list(origins), true)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(restricted)
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let cors = cors_layer(&state.config.server);

    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_api_router().with_state(state))
        .merge(swagger_ui_router())
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors)
}

/// OpenAPI 스펙 내보내기 처리.
///
/// `--export-openapi` 플래그 또는 `EXPORT_OPENAPI` 환경변수가 설정된 경우
/// OpenAPI JSON을 stdout으로 출력하고 종료합니다.
fn handle_export_openapi() -> anyhow::Result<()> {
    use utoipa::OpenApi as _;
    use watch_api::openapi::ApiDoc;

    let export_flag = std::env::args().any(|arg| arg == "--export-openapi");
    let export_env = std::env::var("EXPORT_OPENAPI")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    if export_flag || export_env {
        let json = serde_json::to_string_pretty(&ApiDoc::openapi())?;
        println!("{}", json);
        std::process::exit(0);
    }

    Ok(())
}

/// DB 연결. 실패하면 DB 없이 동작합니다.
async fn connect_database(config: &DatabaseConfig) -> Option<PgPool> {
    let Some(url) = config.url.as_deref() else {
        warn!("DATABASE_URL not set, watchlist/alert APIs will be disabled");
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            return None;
        }
    };

    if let Err(e) = sqlx::query("SELECT 1").fetch_one(&pool).await {
        error!(error = %e, "Failed to verify database connection");
        return None;
    }
    info!("Connected to PostgreSQL");

    if config.run_migrations {
        if let Err(e) = run_migrations(&pool).await {
            error!(error = %e, "마이그레이션 실패, DB 없이 시작합니다");
            return None;
        }
        info!("Database migrations applied");
    }

    Some(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    handle_export_openapi()?;

    let config = AppConfig::load_default().context("설정 로드 실패")?;

    init_logging(LogConfig::from(&config.logging)).map_err(|e| anyhow!("logging init: {}", e))?;
    info!("Starting Stockwatch API server...");

    let metrics_handle = setup_metrics_recorder().context("Prometheus recorder 설치 실패")?;
    info!("Prometheus metrics recorder initialized");

    let addr = config.server.addr();
    let provider = Arc::new(
        YahooMarketDataProvider::new(&config.provider).context("시세 제공자 초기화 실패")?,
    );
    let pool = connect_database(&config.database).await;
    let alerts_config = config.alerts.clone();
    let cleanup_interval = Duration::from_secs(config.cache.cleanup_interval_secs);

    let mut state = AppState::new(config, provider);
    if let Some(pool) = pool {
        state = state.with_db_pool(pool);
    }
    let state = Arc::new(state);

    info!(
        version = %state.version,
        has_db = state.has_db(),
        cache_store = state.cache.store().kind(),
        provider = state.provider.name(),
        "Application state initialized"
    );

    // 전역 종료 토큰 (백그라운드 태스크에 종료 전파)
    let shutdown_token = CancellationToken::new();
    let mut tasks = Vec::new();

    if alerts_config.enabled {
        if let Some(handle) = start_alert_poller(
            Arc::clone(&state),
            AlertPollerConfig::from(&alerts_config),
            shutdown_token.clone(),
        ) {
            tasks.push(handle);
        }
    } else {
        info!("알림 폴러 비활성화 (alerts.enabled = false)");
    }
    tasks.push(start_cache_janitor(
        Arc::clone(&state),
        cleanup_interval,
        shutdown_token.clone(),
    ));

    let app = create_router(state, metrics_handle);

    let listener = tokio::net::TcpListener::bind(addr.as_str())
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("Metrics available at http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();

    // 백그라운드 태스크 종료 대기 (최대 10초)
    let cleanup = tokio::time::timeout(Duration::from_secs(10), futures::future::join_all(tasks)).await;
    if cleanup.is_err() {
        warn!("Cleanup timeout, forcing shutdown");
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
