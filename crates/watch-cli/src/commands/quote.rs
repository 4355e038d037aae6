//! 시세/차트 조회 명령.

use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt::Write;
use tracing::warn;
use watch_core::{Period, PricePoint, Quote, StockSymbol};

use crate::context::CliContext;
use crate::output::{opt, pct, to_json, OutputFormat};

#[derive(Debug, Serialize)]
struct QuoteRow {
    symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    quote: Option<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// 여러 종목의 현재 시세. 일부 실패는 행 단위로 표시하고, 전부 실패하면 오류입니다.
pub async fn quote(ctx: &CliContext, symbols: &[StockSymbol], format: OutputFormat) -> Result<String> {
    let mut rows = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let row = match ctx.provider.quote(symbol).await {
            Ok(quote) => QuoteRow {
                symbol: symbol.to_string(),
                quote: Some(quote),
                error: None,
            },
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "시세 조회 실패");
                QuoteRow {
                    symbol: symbol.to_string(),
                    quote: None,
                    error: Some(e.to_string()),
                }
            }
        };
        rows.push(row);
    }

    if !rows.is_empty() && rows.iter().all(|r| r.quote.is_none()) {
        bail!("모든 종목의 시세 조회에 실패했습니다");
    }

    match format {
        OutputFormat::Json => to_json(&rows),
        OutputFormat::Table => {
            let mut out = String::new();
            writeln!(
                out,
                "{:<10} {:>12} {:>12} {:>10} {:>16}",
                "SYMBOL", "PRICE", "CHANGE", "CHANGE%", "VOLUME"
            )?;
            for row in &rows {
                match &row.quote {
                    Some(q) => writeln!(
                        out,
                        "{:<10} {:>12} {:>12} {:>10} {:>16}",
                        row.symbol,
                        q.price.normalize(),
                        q.change.round_dp(2),
                        pct(q.change_pct),
                        opt(q.volume)
                    )?,
                    None => writeln!(
                        out,
                        "{:<10} ERROR: {}",
                        row.symbol,
                        row.error.as_deref().unwrap_or("unknown")
                    )?,
                }
            }
            Ok(out)
        }
    }
}

/// 기간별 OHLCV.
pub async fn history(
    ctx: &CliContext,
    symbol: &StockSymbol,
    period: Period,
    format: OutputFormat,
) -> Result<String> {
    let points = ctx.provider.history(symbol, period).await?;
    render_history(symbol, period, &points, format)
}

fn render_history(
    symbol: &StockSymbol,
    period: Period,
    points: &[PricePoint],
    format: OutputFormat,
) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(points);
    }

    let mut out = String::new();
    writeln!(
        out,
        "{} {} ({}, {} bars)",
        symbol,
        period.as_str(),
        period.interval(),
        points.len()
    )?;
    writeln!(
        out,
        "{:<17} {:>11} {:>11} {:>11} {:>11} {:>14}",
        "TIME", "OPEN", "HIGH", "LOW", "CLOSE", "VOLUME"
    )?;
    let time_fmt = if period.is_intraday() {
        "%Y-%m-%d %H:%M"
    } else {
        "%Y-%m-%d"
    };
    for p in points {
        writeln!(
            out,
            "{:<17} {:>11} {:>11} {:>11} {:>11} {:>14}",
            p.time.format(time_fmt),
            p.open.round_dp(2),
            p.high.round_dp(2),
            p.low.round_dp(2),
            p.close.round_dp(2),
            p.volume.normalize()
        )?;
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

    fn sym(s: &str) -> StockSymbol {
        StockSymbol::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_quote_table_marks_failed_symbol() {
        let ctx = context(MockMarketDataProvider::new().with_quote("AAPL", dec!(110), dec!(100)));

        let out = quote(&ctx, &[sym("AAPL"), sym("NOPE")], OutputFormat::Table)
            .await
            .unwrap();

        assert!(out.contains("AAPL"));
        assert!(out.contains("+10.00%"));
        assert!(out
            .lines()
            .any(|line| line.starts_with("NOPE") && line.contains("ERROR")));
    }

    #[tokio::test]
    async fn test_quote_all_failed_is_error() {
        let ctx = context(MockMarketDataProvider::new());
        assert!(quote(&ctx, &[sym("NOPE")], OutputFormat::Json).await.is_err());
    }

    #[tokio::test]
    async fn test_quote_json() {
        let ctx = context(MockMarketDataProvider::new().with_quote("MSFT", dec!(400), dec!(400)));

        let out = quote(&ctx, &[sym("MSFT")], OutputFormat::Json).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["symbol"], "MSFT");
        assert!(value[0]["quote"].is_object());
        assert!(value[0].get("error").is_none());
    }

    #[tokio::test]
    async fn test_history_table() {
        let series = daily_series(&[dec!(10), dec!(11), dec!(12)]);
        let ctx = context(MockMarketDataProvider::new().with_history("AAPL", series));

        let out = history(&ctx, &sym("AAPL"), Period::OneMonth, OutputFormat::Table)
            .await
            .unwrap();

        assert!(out.starts_with("AAPL 1mo (1d, 3 bars)"));
        assert_eq!(out.lines().count(), 5);
    }
}
