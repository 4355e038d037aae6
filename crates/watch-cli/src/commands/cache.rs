//! 확장 데이터 캐시 관리 명령.

use anyhow::Result;
use serde::Serialize;
use std::fmt::Write;
use watch_core::{DataCategory, StockSymbol};

use crate::context::CliContext;
use crate::output::{to_json, OutputFormat};

#[derive(Debug, Serialize)]
struct Removed {
    removed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<DataCategory>,
}

/// 카테고리별 통계와 TTL.
pub async fn stats(ctx: &CliContext, format: OutputFormat) -> Result<String> {
    let stats = ctx.cache.stats().await?;
    if format == OutputFormat::Json {
        return to_json(&stats);
    }

    let mut out = String::new();
    writeln!(
        out,
        "store: {}  entries: {}  fresh: {}  expired: {}  failed: {}",
        stats.store, stats.total_entries, stats.fresh, stats.expired, stats.failed
    )?;
    writeln!(
        out,
        "{:<17} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "CATEGORY", "TTL", "TOTAL", "FRESH", "EXPIRED", "FAILED"
    )?;
    for row in &stats.by_category {
        let ttl = stats
            .ttls
            .iter()
            .find(|t| t.category == row.category)
            .map(|t| format!("{}h", t.ttl_secs / 3600))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{:<17} {:>8} {:>8} {:>8} {:>8} {:>8}",
            row.category.as_str(),
            ttl,
            row.total,
            row.fresh,
            row.expired,
            row.failed
        )?;
    }
    Ok(out)
}

/// 보관 기간이 지난 행 삭제.
pub async fn cleanup(ctx: &CliContext, format: OutputFormat) -> Result<String> {
    let removed = ctx.cache.cleanup().await?;
    render_removed(
        Removed {
            removed,
            symbol: None,
            category: None,
        },
        format,
    )
}

/// 종목 캐시 무효화. `category`가 없으면 해당 종목 전체.
pub async fn invalidate(
    ctx: &CliContext,
    symbol: &StockSymbol,
    category: Option<DataCategory>,
    format: OutputFormat,
) -> Result<String> {
    let removed = ctx.cache.invalidate(symbol, category).await?;
    render_removed(
        Removed {
            removed,
            symbol: Some(symbol.to_string()),
            category,
        },
        format,
    )
}

fn render_removed(removed: Removed, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(&removed),
        OutputFormat::Table => {
            let target = match (&removed.symbol, removed.category) {
                (Some(symbol), Some(category)) => format!(" ({}/{})", symbol, category),
                (Some(symbol), None) => format!(" ({})", symbol),
                _ => String::new(),
            };
            Ok(format!("removed {} rows{}\n", removed.removed, target))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use watch_core::CacheConfig;
    use watch_data::testing::MockMarketDataProvider;
    use watch_data::MemoryCacheStore;

    fn context() -> CliContext {
        CliContext::new(
            Arc::new(MockMarketDataProvider::new()),
            Arc::new(MemoryCacheStore::new()),
            CacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_stats_table_lists_ttls() {
        let ctx = context();
        let out = stats(&ctx, OutputFormat::Table).await.unwrap();

        assert!(out.starts_with("store: memory"));
        assert!(out.lines().any(|l| l.starts_with("extended") && l.contains("1h")));
        assert!(out.lines().any(|l| l.starts_with("dividends_splits") && l.contains("24h")));
        assert!(out.lines().any(|l| l.starts_with("holders") && l.contains("12h")));
    }

    #[tokio::test]
    async fn test_invalidate_counts_rows() {
        let ctx = context();
        let symbol = StockSymbol::parse("AAPL").unwrap();
        ctx.cache.extended(&symbol).await.unwrap();
        ctx.cache.calendar(&symbol).await.unwrap();

        let out = invalidate(&ctx, &symbol, Some(DataCategory::Calendar), OutputFormat::Table)
            .await
            .unwrap();
        assert_eq!(out, "removed 1 rows (AAPL/calendar)\n");

        let out = invalidate(&ctx, &symbol, None, OutputFormat::Json).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["removed"], 1);
        assert_eq!(value["symbol"], "AAPL");
    }

    #[tokio::test]
    async fn test_cleanup_empty() {
        let out = cleanup(&context(), OutputFormat::Table).await.unwrap();
        assert_eq!(out, "removed 0 rows\n");
    }
}
