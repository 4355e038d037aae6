//! 확장 데이터 조회 명령.
//!
//! 캐시를 거쳐 조회하므로 PostgreSQL 저장소를 쓰면 서버와 캐시를 공유합니다.

use anyhow::Result;
use serde::Serialize;
use std::fmt::Write;
use watch_core::{DataCategory, StockSymbol};
use watch_data::{Cached, DataSource};

use crate::context::CliContext;
use crate::output::{to_json, OutputFormat};

fn into_json<T: Serialize>(cached: Cached<T>) -> Result<Cached<serde_json::Value>> {
    let data = serde_json::to_value(&cached.data)?;
    Ok(cached.map(|_| data))
}

/// 카테고리 하나를 캐시 경유로 조회합니다.
pub async fn fetch_category(
    ctx: &CliContext,
    symbol: &StockSymbol,
    category: DataCategory,
) -> Result<Cached<serde_json::Value>> {
    match category {
        DataCategory::Extended => into_json(ctx.cache.extended(symbol).await?),
        DataCategory::DividendsSplits => into_json(ctx.cache.dividends_splits(symbol).await?),
        DataCategory::Calendar => into_json(ctx.cache.calendar(symbol).await?),
        DataCategory::Analyst => into_json(ctx.cache.analyst(symbol).await?),
        DataCategory::Holders => into_json(ctx.cache.holders(symbol).await?),
    }
}

/// `category`가 없으면 다섯 카테고리 전체(overview)를 조회합니다.
pub async fn fetch(
    ctx: &CliContext,
    symbol: &StockSymbol,
    category: Option<DataCategory>,
    format: OutputFormat,
) -> Result<String> {
    let Some(category) = category else {
        let overview = ctx.cache.overview(symbol).await;
        return match format {
            OutputFormat::Json => to_json(&overview),
            OutputFormat::Table => {
                let mut out = String::new();
                writeln!(out, "{} overview", symbol)?;
                for (category, error) in overview.errors() {
                    writeln!(out, "  {:<17} ERROR: {}", category.as_str(), error)?;
                }
                if overview.has_stale() {
                    writeln!(out, "  일부 카테고리가 stale 데이터입니다")?;
                }
                write!(out, "{}", to_json(&overview)?)?;
                Ok(out)
            }
        };
    };

    let cached = fetch_category(ctx, symbol, category).await?;
    match format {
        OutputFormat::Json => to_json(&cached),
        OutputFormat::Table => {
            let mut out = String::new();
            writeln!(
                out,
                "{} {} [{}] fetched {} / expires {}",
                symbol,
                category,
                source_label(cached.source),
                cached.fetched_at.format("%Y-%m-%d %H:%M:%S"),
                cached.expires_at.format("%Y-%m-%d %H:%M:%S")
            )?;
            if let Some(warning) = &cached.warning {
                writeln!(out, "WARNING: {}", warning)?;
            }
            write!(out, "{}", to_json(&cached.data)?)?;
            Ok(out)
        }
    }
}

fn source_label(source: DataSource) -> &'static str {
    match source {
        DataSource::Fresh => "fresh",
        DataSource::Cache => "cache",
        DataSource::Stale => "stale",
    }
}
