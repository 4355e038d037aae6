//! 명령 실행 컨텍스트.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use watch_core::{AppConfig, CacheConfig, DatabaseConfig};
use watch_data::{
    CacheStore, ExtendedDataCache, MarketDataProvider, MemoryCacheStore, PgCacheStore,
    YahooMarketDataProvider,
};

/// 시세 제공자와 확장 데이터 캐시.
pub struct CliContext {
    pub provider: Arc<dyn MarketDataProvider>,
    pub cache: ExtendedDataCache,
}

impl CliContext {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<dyn CacheStore>,
        config: CacheConfig,
    ) -> Self {
        let cache = ExtendedDataCache::new(store, Arc::clone(&provider), config);
        Self { provider, cache }
    }

    /// 설정으로부터 Yahoo 제공자와 캐시 저장소를 연결합니다.
    ///
    /// `db_url`이 없으면 설정의 `database.url`(또는 `DATABASE_URL`)을 사용하고,
    /// 그것도 없으면 메모리 저장소로 동작합니다.
    pub async fn connect(config: &AppConfig, db_url: Option<&str>) -> Result<Self> {
        let provider: Arc<dyn MarketDataProvider> = Arc::new(
            YahooMarketDataProvider::new(&config.provider).context("시세 제공자 초기화 실패")?,
        );

        let url = db_url.or(config.database.url.as_deref());
        let store = open_store(url, &config.database).await?;

        Ok(Self::new(provider, store, config.cache.clone()))
    }
}

async fn open_store(url: Option<&str>, config: &DatabaseConfig) -> Result<Arc<dyn CacheStore>> {
    let Some(url) = url else {
        warn!("DATABASE_URL not set, using in-memory cache (discarded on exit)");
        return Ok(Arc::new(MemoryCacheStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections.min(2))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(url)
        .await
        .context("PostgreSQL 연결 실패")?;
    info!("PostgreSQL 캐시 저장소 사용");

    Ok(Arc::new(PgCacheStore::new(pool)))
}
