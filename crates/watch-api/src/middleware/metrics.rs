//! HTTP 요청 메트릭 미들웨어.
//!
//! 요청/응답 수와 처리 시간을 정규화된 경로 라벨로 기록합니다.
//! upstream 장애로 stale 데이터를 반환한 응답(`Warning` 헤더)은 따로 셉니다.

use axum::{extract::Request, http::header, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{
    normalize_path, record_http_duration, record_http_request, record_http_response,
    record_stale_response,
};

pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().as_str().to_owned();
    let path = normalize_path(request.uri().path());

    record_http_request(&method, &path);
    let response = next.run(request).await;

    let status = response.status().as_u16();
    record_http_response(&method, &path, status);
    record_http_duration(&method, &path, started.elapsed().as_secs_f64());
    if response.headers().contains_key(header::WARNING) {
        record_stale_response(&path);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{HeaderValue, StatusCode},
        middleware,
        response::IntoResponse,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn stale_handler() -> impl IntoResponse {
        (
            [(header::WARNING, HeaderValue::from_static("110 - \"Response is Stale\""))],
            "{}",
        )
    }

    fn app() -> Router {
        Router::new()
            .route("/api/v1/stocks/{symbol}/holders", get(stale_handler))
            .layer(middleware::from_fn(metrics_layer))
    }

    #[tokio::test]
    async fn test_stale_response_passes_through() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/stocks/AAPL/holders")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::WARNING));
    }

    #[tokio::test]
    async fn test_unmatched_route_keeps_status() {
        let response = app()
            .oneshot(Request::builder().uri("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
