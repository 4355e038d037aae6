//! 가격 알림 API.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/alerts?status=&symbol=` - 알림 목록
//! - `POST /api/v1/alerts` - 알림 생성
//! - `GET /api/v1/alerts/{id}` - 알림 조회
//! - `PUT /api/v1/alerts/{id}` - 알림 수정
//! - `DELETE /api/v1/alerts/{id}` - 알림 삭제
//! - `POST /api/v1/alerts/check` - 즉시 평가
//! - `GET /api/v1/alerts/events?limit=` - 최근 트리거 이력

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;
use watch_core::{AlertRule, AlertStatus};

use super::{parse_symbol, require_db, SuccessResponse};
use crate::error::{database_unavailable, db_error, not_found, validation_error, ApiResult};
use crate::repository::{
    AlertEventRecord, AlertFilter, AlertRepository, NewAlert, NewStock, StockRepository,
    UpdateAlert,
};
use crate::state::AppState;
use crate::tasks::{check_alerts, AlertCheckError, AlertCheckSummary};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AlertListQuery {
    /// active | triggered | disabled
    pub status: Option<AlertStatus>,
    pub symbol: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertListResponse {
    pub alerts: Vec<AlertRule>,
    pub total: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EventsQuery {
    #[serde(default = "default_events_limit")]
    pub limit: i64,
}

fn default_events_limit() -> i64 {
    50
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertEventsResponse {
    pub events: Vec<AlertEventRecord>,
    pub total: usize,
}

#[utoipa::path(
    get,
    path = "/api/v1/alerts",
    params(AlertListQuery),
    responses(
        (status = 200, body = AlertListResponse),
        (status = 503, body = crate::error::ApiErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertListQuery>,
) -> ApiResult<Json<AlertListResponse>> {
    let symbol = query
        .symbol
        .as_deref()
        .map(parse_symbol)
        .transpose()?
        .map(String::from);
    let pool = require_db(&state)?;

    let filter = AlertFilter {
        status: query.status,
        symbol,
    };
    let alerts = AlertRepository::list(pool, &filter)
        .await
        .map_err(db_error)?;
    let total = alerts.len();

    Ok(Json(AlertListResponse { alerts, total }))
}

/// 알림 생성. 종목 마스터에 없는 심볼은 함께 등록합니다.
#[utoipa::path(
    post,
    path = "/api/v1/alerts",
    request_body = NewAlert,
    responses(
        (status = 201, body = AlertRule),
        (status = 400, body = crate::error::ApiErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn create_alert(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewAlert>,
) -> ApiResult<(StatusCode, Json<AlertRule>)> {
    input.validate().map_err(validation_error)?;
    let symbol = parse_symbol(&input.symbol)?;
    let pool = require_db(&state)?;

    let stock = StockRepository::upsert(
        pool,
        NewStock {
            symbol: symbol.as_str(),
            ..Default::default()
        },
    )
    .await
    .map_err(db_error)?;

    let mut rule = AlertRule::new(symbol, input.condition, input.threshold)
        .with_repeatable(input.repeatable, input.cooldown_secs);
    rule.note = input.note;

    AlertRepository::create(pool, stock.id, &rule)
        .await
        .map_err(db_error)?;
    info!(
        alert_id = %rule.id,
        symbol = %rule.symbol,
        condition = %rule.condition,
        threshold = %rule.threshold,
        "알림 생성"
    );

    Ok((StatusCode::CREATED, Json(rule)))
}

#[utoipa::path(
    get,
    path = "/api/v1/alerts/{id}",
    params(("id" = Uuid, Path, description = "알림 ID")),
    responses(
        (status = 200, body = AlertRule),
        (status = 404, body = crate::error::ApiErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn get_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AlertRule>> {
    let pool = require_db(&state)?;
    AlertRepository::get(pool, id)
        .await
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("Alert {} not found", id)))
}

/// 알림 수정. 조건이나 기준값을 바꾸면 크로스 판정 기준이 초기화됩니다.
#[utoipa::path(
    put,
    path = "/api/v1/alerts/{id}",
    params(("id" = Uuid, Path, description = "알림 ID")),
    request_body = UpdateAlert,
    responses(
        (status = 200, body = AlertRule),
        (status = 404, body = crate::error::ApiErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn update_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateAlert>,
) -> ApiResult<Json<AlertRule>> {
    input.validate().map_err(validation_error)?;
    let pool = require_db(&state)?;

    if !AlertRepository::update(pool, id, &input)
        .await
        .map_err(db_error)?
    {
        return Err(not_found(format!("Alert {} not found", id)));
    }

    AlertRepository::get(pool, id)
        .await
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("Alert {} not found", id)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/alerts/{id}",
    params(("id" = Uuid, Path, description = "알림 ID")),
    responses(
        (status = 200, body = SuccessResponse),
        (status = 404, body = crate::error::ApiErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn delete_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse>> {
    let pool = require_db(&state)?;
    if !AlertRepository::delete(pool, id).await.map_err(db_error)? {
        return Err(not_found(format!("Alert {} not found", id)));
    }
    info!(alert_id = %id, "알림 삭제");
    Ok(Json(SuccessResponse::ok("Alert deleted")))
}

/// 활성 알림을 즉시 평가합니다. 폴러와 같은 로직입니다.
#[utoipa::path(
    post,
    path = "/api/v1/alerts/check",
    responses(
        (status = 200, body = AlertCheckSummary),
        (status = 503, body = crate::error::ApiErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn run_alert_check(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<AlertCheckSummary>> {
    match check_alerts(&state).await {
        Ok(summary) => Ok(Json(summary)),
        Err(AlertCheckError::DatabaseUnavailable) => Err(database_unavailable()),
        Err(AlertCheckError::Database(e)) => Err(db_error(e)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/alerts/events",
    params(EventsQuery),
    responses((status = 200, body = AlertEventsResponse)),
    tag = "alerts"
)]
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<AlertEventsResponse>> {
    let pool = require_db(&state)?;
    let events = AlertRepository::recent_events(pool, query.limit.clamp(1, 500))
        .await
        .map_err(db_error)?;
    let total = events.len();
    Ok(Json(AlertEventsResponse { events, total }))
}

pub fn alerts_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_alerts).post(create_alert))
        .route("/check", post(run_alert_check))
        .route("/events", get(list_events))
        .route(
            "/{id}",
            get(get_alert).put(update_alert).delete(delete_alert),
        )
}
