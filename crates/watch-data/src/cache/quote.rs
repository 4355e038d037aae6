//! 실시간 시세 메모리 캐시.
//!
//! 관심종목 화면과 알림 폴링이 같은 종목을 짧은 간격으로 반복 조회하므로
//! 수십 초 단위 TTL로 upstream 호출을 줄입니다. DB에는 저장하지 않습니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tracing::debug;
use watch_core::{Quote, StockSymbol};

use crate::error::Result;
use crate::provider::MarketDataProvider;

/// 동시 upstream 요청 수.
const MAX_CONCURRENT_FETCHES: usize = 8;

pub struct QuoteCache {
    provider: Arc<dyn MarketDataProvider>,
    ttl: Duration,
    entries: RwLock<HashMap<StockSymbol, (Quote, Instant)>>,
}

impl QuoteCache {
    pub fn new(provider: Arc<dyn MarketDataProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &Arc<dyn MarketDataProvider> {
        &self.provider
    }

    async fn cached(&self, symbol: &StockSymbol) -> Option<Quote> {
        let entries = self.entries.read().await;
        entries
            .get(symbol)
            .filter(|(_, at)| at.elapsed() < self.ttl)
            .map(|(quote, _)| quote.clone())
    }

    /// 캐시된 시세 또는 upstream 조회 결과.
    pub async fn get(&self, symbol: &StockSymbol) -> Result<Quote> {
        if let Some(quote) = self.cached(symbol).await {
            metrics::counter!("quote_cache_lookups_total", "outcome" => "hit").increment(1);
            return Ok(quote);
        }

        metrics::counter!("quote_cache_lookups_total", "outcome" => "miss").increment(1);
        let quote = self.provider.quote(symbol).await?;
        self.entries
            .write()
            .await
            .insert(symbol.clone(), (quote.clone(), Instant::now()));
        Ok(quote)
    }

    /// 여러 종목을 동시에 조회합니다. 입력 순서를 유지하며 실패는 종목별로 반환합니다.
    pub async fn get_many(&self, symbols: &[StockSymbol]) -> Vec<(StockSymbol, Result<Quote>)> {
        stream::iter(symbols.iter().cloned())
            .map(|symbol| async move {
                let result = self.get(&symbol).await;
                (symbol, result)
            })
            .buffered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await
    }

    /// 만료된 항목을 제거합니다.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, at)| at.elapsed() < self.ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed = removed, "만료 시세 캐시 제거");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
