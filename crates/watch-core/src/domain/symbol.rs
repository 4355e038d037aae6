//! 종목 심볼.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WatchError;

/// 심볼 최대 길이.
pub const MAX_SYMBOL_LEN: usize = 15;

/// 정규화된 종목 심볼.
///
/// 공백을 제거하고 대문자로 변환합니다. 허용 문자는 `A-Z 0-9 . ^ = -` 입니다.
/// `^GSPC`처럼 `^`로 시작하면 지수, `BRK-B`, `005930.KS`, `EURUSD=X` 같은 형식도 허용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(try_from = "String", into = "String")]
pub struct StockSymbol(String);

impl StockSymbol {
    /// 입력 문자열을 검증하고 정규화합니다.
    pub fn parse(raw: &str) -> Result<Self, WatchError> {
        let normalized = raw.trim().to_uppercase();

        if normalized.is_empty() {
            return Err(WatchError::InvalidSymbol("empty symbol".to_string()));
        }
        if normalized.len() > MAX_SYMBOL_LEN {
            return Err(WatchError::InvalidSymbol(format!(
                "'{}' exceeds {} characters",
                normalized, MAX_SYMBOL_LEN
            )));
        }
        if let Some(bad) = normalized
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '=' | '-')))
        {
            return Err(WatchError::InvalidSymbol(format!(
                "'{}' contains invalid character '{}'",
                normalized, bad
            )));
        }
        if normalized[1..].contains('^') {
            return Err(WatchError::InvalidSymbol(format!(
                "'{}': '^' is only allowed as prefix",
                normalized
            )));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 지수 심볼 여부 (`^` 접두사).
    pub fn is_index(&self) -> bool {
        self.0.starts_with('^')
    }
}

impl fmt::Display for StockSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StockSymbol {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StockSymbol {
    type Error = WatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StockSymbol> for String {
    fn from(symbol: StockSymbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for StockSymbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
