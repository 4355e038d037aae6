//! 설정 관리.
//!
//! 기본값 → 설정 파일(선택) → `STOCKWATCH__` 접두사 환경 변수 순으로 덮어씁니다.
//!
//! ```text
//! STOCKWATCH__SERVER__PORT=8080
//! STOCKWATCH__CACHE__ANALYST_TTL_SECS=7200
//! STOCKWATCH__INDICES__SYMBOLS=^GSPC,^IXIC
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::DataCategory;
use crate::error::{WatchError, WatchResult};

/// 환경 변수 접두사.
pub const ENV_PREFIX: &str = "STOCKWATCH";

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 시세 제공자 설정
    pub provider: ProviderConfig,
    /// 데이터 캐시 설정
    pub cache: CacheConfig,
    /// 알림 폴링 설정
    pub alerts: AlertsConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 대시보드 지수 목록
    pub indices: IndicesConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 허용할 CORS origin 목록 (비어 있으면 localhost 개발 서버)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_secs: 30,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// `host:port` 형식의 바인딩 주소.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL 접속 URL. 없으면 메모리 캐시로 동작합니다.
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 시작 시 마이그레이션 실행 여부
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connect_timeout_secs: 10,
            run_migrations: true,
        }
    }
}

/// 시세 제공자 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// quoteSummary API 기본 URL
    pub quote_summary_base_url: String,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 일시적 오류 시 최대 재시도 횟수
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            quote_summary_base_url: "https://query2.finance.yahoo.com".to_string(),
            request_timeout_secs: 15,
            max_retries: 2,
        }
    }
}

/// 확장 데이터 캐시 설정.
///
/// 카테고리별 TTL 기본값은 [`DataCategory::default_ttl`]과 같습니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub extended_ttl_secs: u64,
    pub dividends_ttl_secs: u64,
    pub calendar_ttl_secs: u64,
    pub analyst_ttl_secs: u64,
    pub holders_ttl_secs: u64,
    /// 조회 실패 후 재시도까지 stale 데이터를 제공하는 시간 (초)
    pub failure_retry_secs: u64,
    /// 만료 후 정리 대상이 되기까지 보관 시간 (시간)
    pub stale_retention_hours: u64,
    /// 정리 작업 주기 (초)
    pub cleanup_interval_secs: u64,
    /// 실시간 시세 메모리 캐시 TTL (초)
    pub quote_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            extended_ttl_secs: DataCategory::Extended.default_ttl().num_seconds() as u64,
            dividends_ttl_secs: DataCategory::DividendsSplits.default_ttl().num_seconds() as u64,
            calendar_ttl_secs: DataCategory::Calendar.default_ttl().num_seconds() as u64,
            analyst_ttl_secs: DataCategory::Analyst.default_ttl().num_seconds() as u64,
            holders_ttl_secs: DataCategory::Holders.default_ttl().num_seconds() as u64,
            failure_retry_secs: 300,
            stale_retention_hours: 168,
            cleanup_interval_secs: 3600,
            quote_ttl_secs: 30,
        }
    }
}

impl CacheConfig {
    /// 카테고리의 TTL.
    pub fn ttl_for(&self, category: DataCategory) -> Duration {
        let secs = match category {
            DataCategory::Extended => self.extended_ttl_secs,
            DataCategory::DividendsSplits => self.dividends_ttl_secs,
            DataCategory::Calendar => self.calendar_ttl_secs,
            DataCategory::Analyst => self.analyst_ttl_secs,
            DataCategory::Holders => self.holders_ttl_secs,
        };
        Duration::seconds(secs as i64)
    }

    pub fn failure_retry(&self) -> Duration {
        Duration::seconds(self.failure_retry_secs as i64)
    }

    pub fn stale_retention(&self) -> Duration {
        Duration::hours(self.stale_retention_hours as i64)
    }
}

/// 알림 폴링 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// 폴링 활성화 여부
    pub enabled: bool,
    /// 폴링 주기 (초, 기본 15분)
    pub poll_interval_secs: u64,
    /// 서버 시작 후 첫 폴링까지 대기 (초)
    pub initial_delay_secs: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 15 * 60,
            initial_delay_secs: 30,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 대시보드에 표시할 지수 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndicesConfig {
    pub symbols: Vec<String>,
}

impl Default for IndicesConfig {
    fn default() -> Self {
        Self {
            symbols: ["^GSPC", "^DJI", "^IXIC", "^RUT", "^VIX"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AppConfig {
    /// 설정 파일(있다면)과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> WatchResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .with_list_parse_key("indices.symbols"),
            );

        let mut config: AppConfig = builder.build()?.try_deserialize()?;

        if config.database.url.is_none() {
            config.database.url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    /// `STOCKWATCH_CONFIG` 또는 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> WatchResult<Self> {
        let path =
            std::env::var("STOCKWATCH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    /// 값의 범위를 검증합니다.
    pub fn validate(&self) -> WatchResult<()> {
        for category in DataCategory::ALL {
            if self.cache.ttl_for(category) <= Duration::zero() {
                return Err(WatchError::Config(format!(
                    "cache TTL for '{}' must be positive",
                    category
                )));
            }
        }
        if self.alerts.poll_interval_secs == 0 {
            return Err(WatchError::Config(
                "alerts.poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.cache.cleanup_interval_secs == 0 {
            return Err(WatchError::Config(
                "cache.cleanup_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttls_match_categories() {
        let cache = CacheConfig::default();
        assert_eq!(cache.ttl_for(DataCategory::Extended), Duration::hours(1));
        assert_eq!(cache.ttl_for(DataCategory::DividendsSplits), Duration::hours(24));
        assert_eq!(cache.ttl_for(DataCategory::Calendar), Duration::hours(6));
        assert_eq!(cache.ttl_for(DataCategory::Analyst), Duration::hours(4));
        assert_eq!(cache.ttl_for(DataCategory::Holders), Duration::hours(12));
    }

    #[test]
    fn test_default_alert_poll_is_fifteen_minutes() {
        assert_eq!(AlertsConfig::default().poll_interval_secs, 900);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.indices.symbols.len(), 5);
        assert_eq!(config.cache.failure_retry(), Duration::minutes(5));
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = AppConfig::default();
        config.cache.holders_ttl_secs = 0;
        assert!(matches!(config.validate(), Err(WatchError::Config(_))));
    }
}
