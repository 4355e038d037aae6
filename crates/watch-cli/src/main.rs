//! 관심종목 서비스 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 여러 종목 시세
//! stockwatch quote AAPL MSFT ^GSPC
//!
//! # 6개월 차트와 파생 지표
//! stockwatch history AAPL --period 6mo
//! stockwatch metrics AAPL --period 1y --bins 30 --json
//!
//! # 확장 데이터 (캐시 경유)
//! stockwatch fetch AAPL --category analyst
//!
//! # 캐시 관리 (DATABASE_URL이 있으면 PostgreSQL 저장소)
//! stockwatch cache stats
//! stockwatch cache invalidate AAPL --category calendar
//! stockwatch cache cleanup
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use watch_analytics::ProfileMode;
use watch_cli::commands::{cache, fetch, metrics, quote};
use watch_cli::{CliContext, OutputFormat};
use watch_core::{init_logging, AppConfig, DataCategory, LogConfig, LogFormat, Period, StockSymbol};

#[derive(Parser)]
#[command(name = "stockwatch")]
#[command(about = "Stockwatch CLI - 시세 조회, 파생 지표, 확장 데이터 캐시 관리", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON으로 출력
    #[arg(long, global = true)]
    json: bool,

    /// 데이터베이스 URL (기본: DATABASE_URL 환경변수)
    #[arg(long, global = true)]
    db_url: Option<String>,

    /// 로그 레벨 (RUST_LOG가 우선)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 현재 시세
    Quote {
        /// 종목 심볼 (예: AAPL, 005930.KS, ^GSPC)
        #[arg(required = true)]
        symbols: Vec<StockSymbol>,
    },

    /// 기간별 OHLCV
    History {
        symbol: StockSymbol,

        /// 기간 (1d, 5d, 1mo, 3mo, 6mo, ytd, 1y, 2y, 5y, max)
        #[arg(short, long, default_value = "1y")]
        period: Period,
    },

    /// 낙폭/성과/스파크라인/매물대/피보나치
    Metrics {
        symbol: StockSymbol,

        #[arg(short, long, default_value = "1y")]
        period: Period,

        /// 볼륨 프로파일 구간 수 (5~100)
        #[arg(long, default_value = "20")]
        bins: usize,

        /// 거래량 분배 방식 (range, close)
        #[arg(long, default_value = "range", value_parser = parse_profile_mode)]
        mode: ProfileMode,
    },

    /// 확장 데이터 조회 (카테고리 생략 시 전체)
    Fetch {
        symbol: StockSymbol,

        /// extended, dividends_splits, calendar, analyst, holders
        #[arg(short, long)]
        category: Option<DataCategory>,
    },

    /// 확장 데이터 캐시 관리
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// 카테고리별 통계와 TTL
    Stats,

    /// 보관 기간이 지난 행 삭제
    Cleanup,

    /// 종목 캐시 무효화
    Invalidate {
        symbol: StockSymbol,

        /// 생략하면 모든 카테고리
        #[arg(short, long)]
        category: Option<DataCategory>,
    },
}

fn parse_profile_mode(s: &str) -> Result<ProfileMode, String> {
    match s.trim().to_lowercase().as_str() {
        "range" => Ok(ProfileMode::Range),
        "close" => Ok(ProfileMode::Close),
        other => Err(format!("unknown profile mode: {}", other)),
    }
}

async fn run(cli: Cli, ctx: &CliContext) -> Result<String> {
    let format = OutputFormat::from_json_flag(cli.json);

    match cli.command {
        Commands::Quote { symbols } => quote::quote(ctx, &symbols, format).await,
        Commands::History { symbol, period } => quote::history(ctx, &symbol, period, format).await,
        Commands::Metrics {
            symbol,
            period,
            bins,
            mode,
        } => metrics::metrics(ctx, &symbol, period, bins, mode, format).await,
        Commands::Fetch { symbol, category } => fetch::fetch(ctx, &symbol, category, format).await,
        Commands::Cache { action } => match action {
            CacheAction::Stats => cache::stats(ctx, format).await,
            CacheAction::Cleanup => cache::cleanup(ctx, format).await,
            CacheAction::Invalidate { symbol, category } => {
                cache::invalidate(ctx, &symbol, category, format).await
            }
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(
        LogConfig::new(cli.log_level.clone())
            .with_format(LogFormat::Compact)
            .with_stderr(true),
    )
    .map_err(|e| anyhow!("logging init: {}", e))?;

    let config = AppConfig::load_default().context("설정 로드 실패")?;
    let ctx = CliContext::connect(&config, cli.db_url.as_deref()).await?;

    match run(cli, &ctx).await {
        Ok(output) => {
            print!("{}", output);
            if !output.ends_with('\n') {
                println!();
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "command failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cache_invalidate() {
        let cli = Cli::try_parse_from([
            "stockwatch",
            "cache",
            "invalidate",
            "aapl",
            "--category",
            "dividends",
            "--json",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Cache {
                action: CacheAction::Invalidate { symbol, category },
            } => {
                assert_eq!(symbol.as_str(), "AAPL");
                assert_eq!(category, Some(DataCategory::DividendsSplits));
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_parse_metrics_defaults() {
        let cli = Cli::try_parse_from(["stockwatch", "metrics", "MSFT", "-p", "6mo"]).unwrap();
        match cli.command {
            Commands::Metrics {
                period, bins, mode, ..
            } => {
                assert_eq!(period, Period::SixMonths);
                assert_eq!(bins, 20);
                assert_eq!(mode, ProfileMode::Range);
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_rejects_bad_period_and_empty_quote() {
        assert!(Cli::try_parse_from(["stockwatch", "history", "AAPL", "-p", "7w"]).is_err());
        assert!(Cli::try_parse_from(["stockwatch", "quote"]).is_err());
    }
}
