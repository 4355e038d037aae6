//! 가격 알림 규칙 및 조건 정의.
//!
//! ```rust,ignore
//! use watch_core::{AlertRule, AlertCondition, StockSymbol};
//! use rust_decimal_macros::dec;
//!
//! // AAPL 가격이 200을 넘으면 한 번 알림
//! let rule = AlertRule::new(StockSymbol::parse("AAPL")?, AlertCondition::PriceAbove, dec!(200));
//!
//! // 하루 -5% 이상 하락할 때마다 알림 (1시간 쿨다운)
//! let rule = AlertRule::new(StockSymbol::parse("TSLA")?, AlertCondition::ChangePctBelow, dec!(-5))
//!     .with_repeatable(true, Some(3600));
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Quote, StockSymbol};
use crate::error::WatchError;

/// 비교 연산자.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    /// 보다 큼 (>)
    Gt,
    /// 보다 크거나 같음 (>=)
    Gte,
    /// 보다 작음 (<)
    Lt,
    /// 보다 작거나 같음 (<=)
    Lte,
    /// 크로스 업 (이전 < 기준, 현재 >= 기준)
    CrossAbove,
    /// 크로스 다운 (이전 >= 기준, 현재 < 기준)
    CrossBelow,
}

impl ComparisonOperator {
    /// 현재 값을 기준값과 비교합니다.
    ///
    /// 크로스 연산자는 이전 값이 없으면 항상 `false`입니다.
    pub fn evaluate(&self, current: f64, threshold: f64, previous: Option<f64>) -> bool {
        match self {
            Self::Gt => current > threshold,
            Self::Gte => current >= threshold,
            Self::Lt => current < threshold,
            Self::Lte => current <= threshold,
            Self::CrossAbove => previous.is_some_and(|prev| prev < threshold && current >= threshold),
            Self::CrossBelow => previous.is_some_and(|prev| prev >= threshold && current < threshold),
        }
    }
}

/// 알림이 관찰하는 시세 값.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertMetric {
    /// 현재가
    Price,
    /// 전일 대비 변동률 (%)
    ChangePct,
}

impl AlertMetric {
    pub fn observe(&self, quote: &Quote) -> Option<f64> {
        match self {
            AlertMetric::Price => quote.price.to_f64(),
            AlertMetric::ChangePct => quote.change_pct.to_f64(),
        }
    }
}

/// 알림 조건.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AlertCondition {
    /// 가격이 기준가 이상
    PriceAbove,
    /// 가격이 기준가 이하
    PriceBelow,
    /// 가격이 기준가를 상향 돌파
    PriceCrossAbove,
    /// 가격이 기준가를 하향 돌파
    PriceCrossBelow,
    /// 변동률이 기준(%) 이상
    ChangePctAbove,
    /// 변동률이 기준(%) 이하
    ChangePctBelow,
}

impl AlertCondition {
    pub const ALL: [AlertCondition; 6] = [
        AlertCondition::PriceAbove,
        AlertCondition::PriceBelow,
        AlertCondition::PriceCrossAbove,
        AlertCondition::PriceCrossBelow,
        AlertCondition::ChangePctAbove,
        AlertCondition::ChangePctBelow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCondition::PriceAbove => "price_above",
            AlertCondition::PriceBelow => "price_below",
            AlertCondition::PriceCrossAbove => "price_cross_above",
            AlertCondition::PriceCrossBelow => "price_cross_below",
            AlertCondition::ChangePctAbove => "change_pct_above",
            AlertCondition::ChangePctBelow => "change_pct_below",
        }
    }

    pub fn operator(&self) -> ComparisonOperator {
        match self {
            AlertCondition::PriceAbove | AlertCondition::ChangePctAbove => ComparisonOperator::Gte,
            AlertCondition::PriceBelow | AlertCondition::ChangePctBelow => ComparisonOperator::Lte,
            AlertCondition::PriceCrossAbove => ComparisonOperator::CrossAbove,
            AlertCondition::PriceCrossBelow => ComparisonOperator::CrossBelow,
        }
    }

    pub fn metric(&self) -> AlertMetric {
        match self {
            AlertCondition::ChangePctAbove | AlertCondition::ChangePctBelow => {
                AlertMetric::ChangePct
            }
            _ => AlertMetric::Price,
        }
    }

    /// 사람이 읽을 수 있는 조건 설명.
    pub fn describe(&self, threshold: Decimal) -> String {
        match self {
            AlertCondition::PriceAbove => format!("price >= {}", threshold),
            AlertCondition::PriceBelow => format!("price <= {}", threshold),
            AlertCondition::PriceCrossAbove => format!("price crossed above {}", threshold),
            AlertCondition::PriceCrossBelow => format!("price crossed below {}", threshold),
            AlertCondition::ChangePctAbove => format!("daily change >= {}%", threshold),
            AlertCondition::ChangePctBelow => format!("daily change <= {}%", threshold),
        }
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertCondition {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlertCondition::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| WatchError::InvalidInput(format!("unknown alert condition: {}", s)))
    }
}

/// 알림 규칙 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// 활성 상태
    #[default]
    Active,
    /// 트리거됨 (일회성 규칙)
    Triggered,
    /// 사용자가 비활성화
    Disabled,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Triggered => "triggered",
            AlertStatus::Disabled => "disabled",
        }
    }
}

impl FromStr for AlertStatus {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AlertStatus::Active),
            "triggered" => Ok(AlertStatus::Triggered),
            "disabled" => Ok(AlertStatus::Disabled),
            other => Err(WatchError::InvalidInput(format!("unknown alert status: {}", other))),
        }
    }
}

/// 가격 알림 규칙.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct AlertRule {
    pub id: Uuid,
    pub symbol: StockSymbol,
    pub condition: AlertCondition,
    /// 기준값 (가격 또는 변동률 %)
    pub threshold: Decimal,
    #[serde(default)]
    pub status: AlertStatus,
    /// 반복 여부 (false면 한 번만 트리거)
    #[serde(default)]
    pub repeatable: bool,
    /// 재알림 대기 시간 (초, 반복 규칙용)
    #[serde(default)]
    pub cooldown_secs: Option<i64>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub last_triggered_at: Option<DateTime<Utc>>,
    /// 마지막 폴링에서 관찰한 값 (크로스 판정용)
    #[serde(default)]
    pub last_value: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertRule {
    pub fn new(symbol: StockSymbol, condition: AlertCondition, threshold: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            symbol,
            condition,
            threshold,
            status: AlertStatus::Active,
            repeatable: false,
            cooldown_secs: None,
            note: None,
            last_triggered_at: None,
            last_value: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_repeatable(mut self, repeatable: bool, cooldown_secs: Option<i64>) -> Self {
        self.repeatable = repeatable;
        self.cooldown_secs = cooldown_secs;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }

    /// `now` 기준으로 쿨다운 중인지 확인합니다.
    pub fn is_in_cooldown(&self, now: DateTime<Utc>) -> bool {
        if !self.repeatable {
            return false;
        }

        match (self.last_triggered_at, self.cooldown_secs) {
            (Some(last), Some(cooldown)) => now.signed_duration_since(last).num_seconds() < cooldown,
            _ => false,
        }
    }

    /// 시세로 조건을 평가하고, 충족되면 관찰 값을 반환합니다.
    ///
    /// 비활성/쿨다운 상태이면 `None`입니다.
    pub fn evaluate(&self, quote: &Quote, now: DateTime<Utc>) -> Option<f64> {
        if !self.is_active() || self.is_in_cooldown(now) {
            return None;
        }

        let current = self.condition.metric().observe(quote)?;
        let threshold = self.threshold.to_f64()?;

        self.condition
            .operator()
            .evaluate(current, threshold, self.last_value)
            .then_some(current)
    }

    /// 트리거를 기록합니다. 일회성 규칙은 `Triggered` 상태가 됩니다.
    pub fn record_trigger(&mut self, now: DateTime<Utc>, value: f64) {
        self.last_triggered_at = Some(now);
        self.last_value = Some(value);
        self.updated_at = now;

        if !self.repeatable {
            self.status = AlertStatus::Triggered;
        }
    }

    /// 트리거 메시지.
    pub fn trigger_message(&self, observed: f64) -> String {
        format!(
            "{}: {} (observed {:.4})",
            self.symbol,
            self.condition.describe(self.threshold),
            observed
        )
    }
}

/// 알림 이벤트.
///
/// 규칙이 트리거될 때마다 생성됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct AlertEvent {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub symbol: StockSymbol,
    pub condition: AlertCondition,
    pub threshold: Decimal,
    pub observed_value: f64,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn from_trigger(rule: &AlertRule, observed_value: f64, triggered_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_id: rule.id,
            symbol: rule.symbol.clone(),
            condition: rule.condition,
            threshold: rule.threshold,
            observed_value,
            message: rule.trigger_message(observed_value),
            triggered_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn quote(price: Decimal, prev: Decimal) -> Quote {
        Quote::new(StockSymbol::parse("AAPL").unwrap(), price, Some(prev))
    }

    #[test]
    fn test_comparison_operators() {
        assert!(ComparisonOperator::Gt.evaluate(10.0, 5.0, None));
        assert!(!ComparisonOperator::Lt.evaluate(10.0, 5.0, None));
        assert!(ComparisonOperator::Lte.evaluate(5.0, 5.0, None));
        assert!(ComparisonOperator::CrossAbove.evaluate(10.0, 8.0, Some(7.0)));
        assert!(!ComparisonOperator::CrossAbove.evaluate(10.0, 8.0, Some(9.0)));
        assert!(!ComparisonOperator::CrossAbove.evaluate(10.0, 8.0, None));
        assert!(ComparisonOperator::CrossBelow.evaluate(7.0, 8.0, Some(8.0)));
    }

    #[test]
    fn test_one_shot_alert_fires_once() {
        let now = Utc::now();
        let mut rule = AlertRule::new(
            StockSymbol::parse("AAPL").unwrap(),
            AlertCondition::PriceAbove,
            dec!(200),
        );

        assert!(rule.evaluate(&quote(dec!(190), dec!(185)), now).is_none());

        let observed = rule.evaluate(&quote(dec!(201.5), dec!(199)), now).unwrap();
        assert_eq!(observed, 201.5);
        rule.record_trigger(now, observed);

        assert_eq!(rule.status, AlertStatus::Triggered);
        assert!(rule.evaluate(&quote(dec!(210), dec!(201)), now).is_none());
    }

    #[test]
    fn test_repeatable_alert_respects_cooldown() {
        let now = Utc::now();
        let mut rule = AlertRule::new(
            StockSymbol::parse("TSLA").unwrap(),
            AlertCondition::ChangePctBelow,
            dec!(-5),
        )
        .with_repeatable(true, Some(3600));

        let crash = quote(dec!(90), dec!(100));
        let observed = rule.evaluate(&crash, now).unwrap();
        assert_eq!(observed, -10.0);
        rule.record_trigger(now, observed);
        assert_eq!(rule.status, AlertStatus::Active);

        assert!(rule.is_in_cooldown(now + Duration::minutes(30)));
        assert!(rule.evaluate(&crash, now + Duration::minutes(30)).is_none());
        assert!(rule.evaluate(&crash, now + Duration::minutes(61)).is_some());
    }

    #[test]
    fn test_cross_alert_needs_previous_value() {
        let now = Utc::now();
        let mut rule = AlertRule::new(
            StockSymbol::parse("MSFT").unwrap(),
            AlertCondition::PriceCrossAbove,
            dec!(400),
        );

        assert!(rule.evaluate(&quote(dec!(405), dec!(390)), now).is_none());

        rule.last_value = Some(395.0);
        assert_eq!(rule.evaluate(&quote(dec!(405), dec!(395)), now), Some(405.0));
    }

    #[test]
    fn test_disabled_alert_never_fires() {
        let mut rule = AlertRule::new(
            StockSymbol::parse("AAPL").unwrap(),
            AlertCondition::PriceBelow,
            dec!(500),
        );
        rule.status = AlertStatus::Disabled;
        assert!(rule.evaluate(&quote(dec!(100), dec!(100)), Utc::now()).is_none());
    }

    #[test]
    fn test_event_from_trigger() {
        let rule = AlertRule::new(
            StockSymbol::parse("NVDA").unwrap(),
            AlertCondition::PriceAbove,
            dec!(100),
        );
        let event = AlertEvent::from_trigger(&rule, 101.0, Utc::now());
        assert_eq!(event.alert_id, rule.id);
        assert!(event.message.starts_with("NVDA: price >= 100"));
    }

    #[test]
    fn test_condition_string_roundtrip() {
        for c in AlertCondition::ALL {
            assert_eq!(c.as_str().parse::<AlertCondition>().unwrap(), c);
        }
        assert_eq!(
            serde_json::to_string(&AlertCondition::ChangePctAbove).unwrap(),
            "\"change_pct_above\""
        );
    }
}
