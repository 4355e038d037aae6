//! 관심종목 서비스의 에러 타입.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum WatchError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 종목 심볼
    #[error("잘못된 심볼: {0}")]
    InvalidSymbol(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 외부 시세 제공자 에러
    #[error("시세 제공자 에러: {0}")]
    Upstream(String),

    /// 요청 한도 초과
    #[error("요청 한도 초과: {0}")]
    RateLimit(String),

    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type WatchResult<T> = Result<T, WatchError>;

impl WatchError {
    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WatchError::Upstream(_) | WatchError::RateLimit(_))
    }

    /// 클라이언트 입력 문제로 인한 에러인지 확인합니다.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            WatchError::InvalidSymbol(_) | WatchError::InvalidInput(_) | WatchError::NotFound(_)
        )
    }
}

impl From<serde_json::Error> for WatchError {
    fn from(err: serde_json::Error) -> Self {
        WatchError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for WatchError {
    fn from(err: config::ConfigError) -> Self {
        WatchError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(WatchError::Upstream("timeout".to_string()).is_retryable());
        assert!(WatchError::RateLimit("429".to_string()).is_retryable());
        assert!(!WatchError::InvalidSymbol("$$".to_string()).is_retryable());
    }

    #[test]
    fn test_error_client() {
        assert!(WatchError::NotFound("alert".to_string()).is_client_error());
        assert!(!WatchError::Database("down".to_string()).is_client_error());
    }
}
