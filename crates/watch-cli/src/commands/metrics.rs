//! 파생 지표 계산 명령.

use anyhow::{bail, Result};
use chrono::Utc;
use std::fmt::Write;
use watch_analytics::{MetricsOptions, ProfileMode, StockMetrics};
use watch_core::{Period, StockSymbol};

use crate::context::CliContext;
use crate::output::{opt, pct, to_json, OutputFormat};

/// 기간 차트를 조회해 낙폭, 성과, 스파크라인, 매물대, 피보나치 레벨을 계산합니다.
pub async fn metrics(
    ctx: &CliContext,
    symbol: &StockSymbol,
    period: Period,
    bins: usize,
    mode: ProfileMode,
    format: OutputFormat,
) -> Result<String> {
    let points = ctx.provider.history(symbol, period).await?;
    if points.is_empty() {
        bail!("{}: {} 기간 데이터가 없습니다", symbol, period);
    }

    let options = MetricsOptions {
        profile_bins: bins,
        profile_mode: mode,
        ..Default::default()
    };
    let metrics = StockMetrics::compute(&points, Utc::now(), &options);

    match format {
        OutputFormat::Json => to_json(&metrics),
        OutputFormat::Table => render(symbol, period, &metrics),
    }
}

fn render(symbol: &StockSymbol, period: Period, m: &StockMetrics) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{} ({}, {} bars)", symbol, period, m.points)?;
    writeln!(out, "  last close     {}", opt(m.last_close))?;
    writeln!(
        out,
        "  range          {} ~ {}",
        opt(m.period_low),
        opt(m.period_high)
    )?;

    if let Some(mdd) = &m.max_drawdown {
        writeln!(
            out,
            "  max drawdown   {} ({} -> {})",
            pct(mdd.drawdown_pct),
            mdd.peak_time.format("%Y-%m-%d"),
            mdd.trough_time.format("%Y-%m-%d")
        )?;
    }
    if let Some(current) = m.current_drawdown_pct {
        writeln!(out, "  drawdown now   {}", pct(current))?;
    }

    if !m.performance.is_empty() {
        writeln!(out, "performance")?;
        for delta in &m.performance {
            writeln!(out, "  {:<5} {:>10}", delta.window.as_str(), pct(delta.change_pct))?;
        }
    }

    if let Some(spark) = &m.sparkline {
        writeln!(
            out,
            "sparkline        {:?} {} ({} points)",
            spark.trend,
            pct(spark.change_pct),
            spark.points.len()
        )?;
    }

    if let Some(profile) = &m.volume_profile {
        writeln!(
            out,
            "volume profile   POC {} / value area {} ~ {}",
            profile.poc.round_dp(2),
            profile.value_area_low.round_dp(2),
            profile.value_area_high.round_dp(2)
        )?;
    }

    if let Some(fib) = &m.fibonacci {
        writeln!(
            out,
            "fibonacci        {:?} swing {} ~ {}",
            fib.direction,
            fib.swing_low.round_dp(2),
            fib.swing_high.round_dp(2)
        )?;
        for level in &fib.retracements {
            writeln!(out, "  {:<7} {}", level.label, level.price.round_dp(2))?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use watch_core::CacheConfig;
    use watch_data::testing::{daily_series, MockMarketDataProvider};
    use watch_data::MemoryCacheStore;

    fn context(provider: MockMarketDataProvider) -> CliContext {
        CliContext::new(
            Arc::new(provider),
            Arc::new(MemoryCacheStore::new()),
            CacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_metrics_table_sections() {
        let series = daily_series(&[dec!(100), dec!(120), dec!(90), dec!(110), dec!(105)]);
        let ctx = context(MockMarketDataProvider::new().with_history("AAPL", series));
        let symbol = StockSymbol::parse("AAPL").unwrap();

        let out = metrics(&ctx, &symbol, Period::OneMonth, 10, ProfileMode::Range, OutputFormat::Table)
            .await
            .unwrap();

        assert!(out.starts_with("AAPL (1mo, 5 bars)"));
        assert!(out.contains("max drawdown   -25.00%"));
        assert!(out.contains("volume profile"));
        assert!(out.contains("fibonacci"));
    }

    #[tokio::test]
    async fn test_metrics_json() {
        let series = daily_series(&[dec!(10), dec!(11), dec!(12), dec!(13)]);
        let ctx = context(MockMarketDataProvider::new().with_history("MSFT", series));
        let symbol = StockSymbol::parse("MSFT").unwrap();

        let out = metrics(&ctx, &symbol, Period::OneYear, 5, ProfileMode::Close, OutputFormat::Json)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["points"], 4);
        assert_eq!(value["volume_profile"]["mode"], "close");
        assert_eq!(value["volume_profile"]["price_levels"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_metrics_unknown_symbol() {
        let ctx = context(MockMarketDataProvider::new());
        let symbol = StockSymbol::parse("NOPE").unwrap();
        let result = metrics(&ctx, &symbol, Period::OneYear, 10, ProfileMode::Range, OutputFormat::Table).await;
        assert!(result.is_err());
    }
}
