//! 출력 형식.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Table
        }
    }
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// 값이 없으면 `-`.
pub fn opt(value: Option<Decimal>) -> String {
    value.map(|v| v.normalize().to_string()).unwrap_or_else(|| "-".to_string())
}

/// 부호 포함 백분율 (소수점 2자리).
pub fn pct(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    if rounded < Decimal::ZERO {
        format!("{:.2}%", rounded)
    } else {
        format!("+{:.2}%", rounded.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pct_sign() {
        assert_eq!(pct(dec!(1.234)), "+1.23%");
        assert_eq!(pct(dec!(-0.5)), "-0.50%");
        assert_eq!(pct(Decimal::ZERO), "+0.00%");
    }

    #[test]
    fn test_opt() {
        assert_eq!(opt(None), "-");
        assert_eq!(opt(Some(dec!(12.500))), "12.5");
    }
}
