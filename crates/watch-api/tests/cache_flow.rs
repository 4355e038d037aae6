//! 확장 데이터 캐시 흐름 통합 테스트
//!
//! 전체 API 라우터를 통해 fresh → cache → stale 전환과 캐시 관리 API를 확인합니다.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use tower::ServiceExt;
use watch_api::{create_api_router, AppState};
use watch_core::{AppConfig, DataCategory};
use watch_data::testing::MockMarketDataProvider;
use watch_data::{CacheEntry, CacheStore};

fn setup() -> (Arc<MockMarketDataProvider>, Arc<AppState>, Router) {
    let provider = Arc::new(
        MockMarketDataProvider::new()
            .with_quote("AAPL", dec!(190), dec!(185))
            .with_quote("MSFT", dec!(410), dec!(415)),
    );
    let state = Arc::new(AppState::new(AppConfig::default(), provider.clone()));
    let app = create_api_router().with_state(Arc::clone(&state));
    (provider, state, app)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<&str>,
) -> (StatusCode, Option<String>, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let warning = response
        .headers()
        .get(header::WARNING)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, warning, json)
}

#[tokio::test]
async fn test_fresh_then_cached_then_stale() {
    let (provider, state, app) = setup();

    let (status, _, body) = send(&app, "GET", "/api/v1/stocks/AAPL/calendar", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "fresh");
    assert_eq!(body["stale"], false);

    let (_, _, body) = send(&app, "GET", "/api/v1/stocks/AAPL/calendar", None).await;
    assert_eq!(body["source"], "cache");
    assert_eq!(provider.calls(DataCategory::Calendar), 1);

    // 만료된 행으로 바꾼 뒤 upstream 장애
    let now = Utc::now();
    let expired = CacheEntry::fresh(
        "AAPL",
        DataCategory::Calendar,
        serde_json::json!({ "earnings_dates": [] }),
        now - Duration::hours(7),
        now - Duration::hours(1),
    );
    state.cache.store().upsert(&expired).await.unwrap();
    provider.fail_category(DataCategory::Calendar, true);

    let (status, warning, body) = send(&app, "GET", "/api/v1/stocks/AAPL/calendar", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "stale");
    assert_eq!(body["stale"], true);
    assert!(body["warning"].as_str().unwrap().contains("upstream"));
    assert!(warning.unwrap().starts_with("110"));
    assert_eq!(provider.calls(DataCategory::Calendar), 2);

    // 실패 후 back-off 기간에는 upstream을 다시 호출하지 않음
    let (_, _, body) = send(&app, "GET", "/api/v1/stocks/AAPL/calendar", None).await;
    assert_eq!(body["source"], "stale");
    assert_eq!(provider.calls(DataCategory::Calendar), 2);

    let (_, _, stats) = send(&app, "GET", "/api/v1/cache/stats", None).await;
    let calendar = stats["by_category"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["category"] == "calendar")
        .unwrap();
    assert_eq!(calendar["total"], 1);
    assert_eq!(calendar["failed"], 1);
}

#[tokio::test]
async fn test_failure_without_cached_data_is_bad_gateway() {
    let (provider, _, app) = setup();
    provider.fail_category(DataCategory::Holders, true);

    let (status, _, body) = send(&app, "GET", "/api/v1/stocks/MSFT/holders", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "UPSTREAM_UNAVAILABLE");
}

#[tokio::test]
async fn test_unknown_symbol_stays_not_found_during_backoff() {
    let provider = Arc::new(MockMarketDataProvider::new().with_unknown_symbol("ZZZZ"));
    let state = Arc::new(AppState::new(AppConfig::default(), provider.clone()));
    let app = create_api_router().with_state(state);

    for _ in 0..2 {
        let (status, _, body) = send(&app, "GET", "/api/v1/stocks/ZZZZ/extended", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NO_DATA");
    }
    // 두 번째 요청은 재시도 대기 행으로 응답
    assert_eq!(provider.calls(DataCategory::Extended), 1);
}

#[tokio::test]
async fn test_invalidate_category_across_symbols() {
    let (provider, _, app) = setup();

    for symbol in ["AAPL", "MSFT"] {
        let uri = format!("/api/v1/stocks/{}/analyst", symbol);
        let (status, _, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
    }
    send(&app, "GET", "/api/v1/stocks/AAPL/extended", None).await;

    let (status, _, body) = send(
        &app,
        "POST",
        "/api/v1/cache/invalidate",
        Some(r#"{"category": "analyst"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 2);

    // 무효화 후에는 다시 upstream 조회
    let (_, _, body) = send(&app, "GET", "/api/v1/stocks/AAPL/analyst", None).await;
    assert_eq!(body["source"], "fresh");
    assert_eq!(provider.calls(DataCategory::Analyst), 3);

    // extended 행은 그대로
    let (_, _, body) = send(&app, "GET", "/api/v1/stocks/AAPL/extended", None).await;
    assert_eq!(body["source"], "cache");

    let (_, _, body) = send(&app, "POST", "/api/v1/cache/invalidate", Some("{}")).await;
    assert_eq!(body["removed"], 2);
}

#[tokio::test]
async fn test_database_endpoints_unavailable_without_pool() {
    let (_, _, app) = setup();

    let (status, _, body) = send(&app, "GET", "/api/v1/watchlists", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "DATABASE_UNAVAILABLE");

    let (status, _, _) = send(&app, "GET", "/api/v1/alerts", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _, body) = send(&app, "GET", "/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"]["database"]["status"], "not_configured");
}
