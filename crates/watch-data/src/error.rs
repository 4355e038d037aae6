//! 데이터 모듈 오류 타입.

use thiserror::Error;
use watch_core::{DataCategory, WatchError};

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 중복 레코드
    #[error("Duplicate record: {0}")]
    DuplicateError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 잘못된 입력
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 외부 소스 요청 실패
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// 응답 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 외부 소스 요청 한도 초과
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// 제공자가 해당 종목 데이터를 갖고 있지 않음
    #[error("No data for {0}")]
    NoData(String),

    /// 캐시에 이전 데이터가 없는 상태에서 upstream 조회 실패
    #[error("Upstream fetch failed for {symbol}/{category} and no cached data is available: {message}")]
    Upstream {
        symbol: String,
        category: DataCategory,
        message: String,
    },
}

impl DataError {
    /// 재시도할 가치가 있는 일시적 오류인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::FetchError(_) | DataError::ConnectionError(_) | DataError::RateLimited(_)
        )
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::ConnectionError("pool timed out".to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                if code == "23505" {
                    // PostgreSQL 고유 제약 조건 위반
                    DataError::DuplicateError(db_err.message().to_string())
                } else {
                    DataError::QueryError(db_err.message().to_string())
                }
            }
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DataError::ParseError(err.to_string())
        } else {
            DataError::FetchError(err.to_string())
        }
    }
}

impl From<WatchError> for DataError {
    fn from(err: WatchError) -> Self {
        match err {
            WatchError::InvalidSymbol(msg) | WatchError::InvalidInput(msg) => {
                DataError::InvalidInput(msg)
            }
            WatchError::NotFound(msg) => DataError::NotFound(msg),
            WatchError::RateLimit(msg) => DataError::RateLimited(msg),
            WatchError::Serialization(msg) => DataError::SerializationError(msg),
            other => DataError::FetchError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
