//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! `Arc<AppState>`로 래핑되어 라우터와 백그라운드 태스크가 함께 사용합니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use watch_core::AppConfig;
use watch_data::{
    CacheStore, ExtendedDataCache, MarketDataProvider, MemoryCacheStore, PgCacheStore, QuoteCache,
};

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 로드된 설정
    pub config: Arc<AppConfig>,

    /// 데이터베이스 연결 풀 (없으면 관심종목/알림 API 비활성)
    pub db_pool: Option<PgPool>,

    /// 시세 제공자
    pub provider: Arc<dyn MarketDataProvider>,

    /// 카테고리별 TTL 확장 데이터 캐시
    pub cache: Arc<ExtendedDataCache>,

    /// 실시간 시세 캐시
    pub quotes: Arc<QuoteCache>,

    /// 서버 시작 시각
    pub started_at: DateTime<Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 메모리 캐시 저장소로 상태를 생성합니다.
    ///
    /// DB 풀을 연결하면 [`with_db_pool`](Self::with_db_pool)이 PostgreSQL 저장소로 교체합니다.
    pub fn new(config: AppConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let cache = Arc::new(ExtendedDataCache::new(
            store,
            Arc::clone(&provider),
            config.cache.clone(),
        ));
        let quotes = Arc::new(QuoteCache::new(
            Arc::clone(&provider),
            std::time::Duration::from_secs(config.cache.quote_ttl_secs),
        ));

        Self {
            config: Arc::new(config),
            db_pool: None,
            provider,
            cache,
            quotes,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// DB 풀을 연결하고 캐시 저장소를 PostgreSQL로 교체합니다.
    pub fn with_db_pool(mut self, pool: PgPool) -> Self {
        let store: Arc<dyn CacheStore> = Arc::new(PgCacheStore::new(pool.clone()));
        self.cache = Arc::new(ExtendedDataCache::new(
            store,
            Arc::clone(&self.provider),
            self.config.cache.clone(),
        ));
        self.db_pool = Some(pool);
        self
    }

    pub fn has_db(&self) -> bool {
        self.db_pool.is_some()
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        match &self.db_pool {
            Some(pool) => sqlx::query("SELECT 1").execute(pool).await.is_ok(),
            None => false,
        }
    }

    /// 캐시 저장소 연결 상태 확인.
    pub async fn is_cache_store_healthy(&self) -> bool {
        self.cache.store().ping().await.is_ok()
    }
}

/// 테스트용 상태 (DB 없음, 가짜 시세 제공자).
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    use rust_decimal_macros::dec;
    use watch_data::testing::MockMarketDataProvider;

    let provider = MockMarketDataProvider::new()
        .with_quote("AAPL", dec!(190), dec!(185))
        .with_quote("MSFT", dec!(410), dec!(415))
        .with_quote("^GSPC", dec!(5200), dec!(5150));

    create_test_state_with(Arc::new(provider))
}

/// 주어진 가짜 제공자로 테스트 상태를 만듭니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state_with(
    provider: Arc<watch_data::testing::MockMarketDataProvider>,
) -> AppState {
    let mut config = AppConfig::default();
    config.indices.symbols = vec!["^GSPC".to_string()];
    AppState::new(config, provider)
}
