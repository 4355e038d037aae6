//! 통합 API 에러 응답 타입.
//!
//! 모든 엔드포인트는 실패 시 [`ApiErrorResponse`]를 JSON으로 반환합니다.
//! 도메인/데이터 에러는 아래 헬퍼로 HTTP 상태 코드에 매핑합니다.
//!
//! | 에러 | 상태 |
//! |---|---|
//! | 잘못된 입력, 심볼, 검증 실패 | 400 |
//! | 리소스 없음, 제공자 데이터 없음 | 404 |
//! | 중복 | 409 |
//! | 요청 한도 초과 | 429 |
//! | upstream 실패 (캐시 없음) | 502 |
//! | DB 미설정/연결 실패 | 503 |
//! | 그 외 | 500 |

use axum::http::{Method, StatusCode, Uri};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};
use utoipa::ToSchema;
use watch_core::WatchError;
use watch_data::DataError;

/// 통합 API 에러 응답.
///
/// ```json
/// {
///   "code": "UPSTREAM_UNAVAILABLE",
///   "message": "Upstream fetch failed for AAPL/analyst and no cached data is available: ...",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "NOT_FOUND", "INVALID_SYMBOL", "DATABASE_UNAVAILABLE")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Unix timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ApiErrorResponse {
    /// 타임스탬프를 포함한 에러.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
            method: None,
            path: None,
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    /// 타임스탬프 없는 간단한 에러.
    pub fn simple(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: None,
            method: None,
            path: None,
        }
    }

    /// 요청 정보(메서드, 경로)를 추가합니다.
    #[must_use]
    pub fn with_request_info(mut self, method: &Method, uri: &Uri) -> Self {
        self.method = Some(method.to_string());
        self.path = Some(uri.path().to_string());
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// 핸들러 에러 타입.
pub type ApiError = (StatusCode, Json<ApiErrorResponse>);

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

/// 상태 코드와 에러 코드로 에러 응답을 만듭니다.
pub fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(ApiErrorResponse::new(code, message)))
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
}

/// DB가 설정되지 않은 상태에서 DB가 필요한 엔드포인트 호출.
pub fn database_unavailable() -> ApiError {
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "DATABASE_UNAVAILABLE",
        "Database is not configured",
    )
}

/// `validator` 검증 실패를 필드별 상세 정보와 함께 400으로 변환합니다.
pub fn validation_error(errors: validator::ValidationErrors) -> ApiError {
    let details = serde_json::to_value(&errors).unwrap_or(Value::Null);
    (
        StatusCode::BAD_REQUEST,
        Json(ApiErrorResponse::with_details(
            "VALIDATION_ERROR",
            "Request validation failed",
            details,
        )),
    )
}

/// 도메인 에러 매핑.
pub fn watch_error(err: WatchError) -> ApiError {
    match &err {
        WatchError::InvalidSymbol(_) => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_SYMBOL", err.to_string())
        }
        WatchError::InvalidInput(_) => bad_request(err.to_string()),
        WatchError::NotFound(_) => not_found(err.to_string()),
        WatchError::RateLimit(_) => {
            api_error(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", err.to_string())
        }
        WatchError::Upstream(_) => {
            api_error(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", err.to_string())
        }
        WatchError::Database(_) => {
            error!(error = %err, "데이터베이스 에러");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", err.to_string())
        }
        WatchError::Config(_) | WatchError::Serialization(_) | WatchError::Internal(_) => {
            error!(error = %err, "내부 에러");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string())
        }
    }
}

/// 데이터 계층 에러 매핑.
///
/// 캐시에 stale 데이터가 있으면 서비스가 이미 성공으로 처리하므로 여기로 오는
/// upstream 에러는 이전 데이터가 전혀 없는 경우입니다.
pub fn data_error(err: DataError) -> ApiError {
    match &err {
        DataError::NotFound(_) => not_found(err.to_string()),
        DataError::NoData(_) => api_error(StatusCode::NOT_FOUND, "NO_DATA", err.to_string()),
        DataError::InvalidInput(_) => bad_request(err.to_string()),
        DataError::DuplicateError(_) => {
            api_error(StatusCode::CONFLICT, "DUPLICATE", err.to_string())
        }
        DataError::RateLimited(_) => {
            warn!(error = %err, "upstream 요청 한도 초과");
            api_error(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", err.to_string())
        }
        DataError::Upstream { .. } => {
            warn!(error = %err, "upstream 실패, 캐시 없음");
            api_error(StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE", err.to_string())
        }
        DataError::FetchError(_) | DataError::ParseError(_) => {
            warn!(error = %err, "upstream 조회 실패");
            api_error(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", err.to_string())
        }
        DataError::ConnectionError(_) => {
            error!(error = %err, "저장소 연결 실패");
            api_error(StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE", err.to_string())
        }
        DataError::QueryError(_) | DataError::SerializationError(_) => {
            error!(error = %err, "저장소 에러");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", err.to_string())
        }
    }
}

/// SQL 에러 매핑. 고유 제약 위반은 409입니다.
pub fn db_error(err: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return api_error(StatusCode::CONFLICT, "DUPLICATE", db_err.message().to_string());
        }
    }
    error!(error = %err, "쿼리 실패");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", err.to_string())
}
