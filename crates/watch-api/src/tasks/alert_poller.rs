//! 가격 알림 폴러.
//!
//! 고정 주기(기본 15분)로 활성 알림을 평가합니다.
//! - 활성 규칙 조회 → 종목별 시세 일괄 조회 (`QuoteCache`)
//! - 조건 충족 시 트리거 기록 및 이벤트 저장
//! - 크로스 판정을 위해 매 회차 관찰 값을 `last_value`로 저장
//!
//! `POST /api/v1/alerts/check`도 같은 [`check_alerts`]를 사용합니다.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use watch_core::{AlertEvent, AlertRule, AlertsConfig, Quote, StockSymbol};

use crate::metrics::{record_alert_check, record_alert_triggered};
use crate::repository::AlertRepository;
use crate::state::AppState;

/// 알림 폴러 설정.
#[derive(Debug, Clone)]
pub struct AlertPollerConfig {
    /// 폴링 주기 (기본: 15분)
    pub poll_interval: Duration,
    /// 서버 시작 후 첫 폴링까지 대기
    pub initial_delay: Duration,
}

impl Default for AlertPollerConfig {
    fn default() -> Self {
        Self::from(&AlertsConfig::default())
    }
}

impl From<&AlertsConfig> for AlertPollerConfig {
    fn from(config: &AlertsConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            initial_delay: Duration::from_secs(config.initial_delay_secs),
        }
    }
}

#[derive(Debug, Error)]
pub enum AlertCheckError {
    #[error("database is not configured")]
    DatabaseUnavailable,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// 알림 검사 한 회차 결과.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AlertCheckSummary {
    /// 평가한 활성 규칙 수
    pub evaluated: usize,
    pub triggered: usize,
    /// 시세 조회에 실패한 종목
    pub quote_failures: Vec<String>,
    pub events: Vec<AlertEvent>,
    pub checked_at: DateTime<Utc>,
}

/// 평가 후 저장할 변경 한 건.
#[derive(Debug, Clone)]
pub enum RuleWrite {
    /// 트리거. `previous_trigger`는 평가 전에 읽은 `last_triggered_at`으로,
    /// 저장 시 다른 검사와의 중복 트리거를 막는 조건으로 사용됩니다.
    Trigger {
        index: usize,
        previous_trigger: Option<DateTime<Utc>>,
        event: AlertEvent,
    },
    /// 트리거 없이 관찰 값만 바뀜
    Observe { index: usize },
}

/// 시세로 규칙을 평가하고 저장할 변경 목록을 반환합니다.
///
/// 시세가 있는 규칙은 트리거 여부와 무관하게 `last_value`가 갱신됩니다.
pub fn evaluate_rules(
    rules: &mut [AlertRule],
    quotes: &HashMap<StockSymbol, Quote>,
    now: DateTime<Utc>,
) -> Vec<RuleWrite> {
    let mut writes = Vec::new();

    for (index, rule) in rules.iter_mut().enumerate() {
        let Some(quote) = quotes.get(&rule.symbol) else {
            continue;
        };

        if let Some(observed) = rule.evaluate(quote, now) {
            let previous_trigger = rule.last_triggered_at;
            rule.record_trigger(now, observed);
            let event = AlertEvent::from_trigger(rule, observed, now);
            info!(
                alert_id = %rule.id,
                symbol = %rule.symbol,
                condition = %rule.condition,
                observed = observed,
                "알림 트리거"
            );
            writes.push(RuleWrite::Trigger {
                index,
                previous_trigger,
                event,
            });
        } else if let Some(current) = rule.condition.metric().observe(quote) {
            if rule.last_value != Some(current) {
                rule.last_value = Some(current);
                writes.push(RuleWrite::Observe { index });
            }
        }
    }

    writes
}

/// 활성 알림을 한 번 평가하고 결과를 저장합니다.
pub async fn check_alerts(state: &AppState) -> Result<AlertCheckSummary, AlertCheckError> {
    let pool = state
        .db_pool
        .as_ref()
        .ok_or(AlertCheckError::DatabaseUnavailable)?;
    let started = Instant::now();
    let now = Utc::now();

    let mut rules = AlertRepository::list_active(pool).await?;
    if rules.is_empty() {
        debug!("평가할 활성 알림 없음");
        record_alert_check(0, started.elapsed().as_secs_f64());
        return Ok(AlertCheckSummary {
            evaluated: 0,
            triggered: 0,
            quote_failures: Vec::new(),
            events: Vec::new(),
            checked_at: now,
        });
    }

    let symbols: Vec<StockSymbol> = rules
        .iter()
        .map(|r| r.symbol.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut quotes = HashMap::with_capacity(symbols.len());
    let mut quote_failures = Vec::new();
    for (symbol, result) in state.quotes.get_many(&symbols).await {
        match result {
            Ok(quote) => {
                quotes.insert(symbol, quote);
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "알림 평가용 시세 조회 실패");
                quote_failures.push(symbol.to_string());
            }
        }
    }

    let mut events = Vec::new();
    for write in evaluate_rules(&mut rules, &quotes, now) {
        match write {
            RuleWrite::Trigger {
                index,
                previous_trigger,
                event,
            } => {
                let rule = &rules[index];
                if AlertRepository::claim_trigger(pool, rule, previous_trigger, &event).await? {
                    record_alert_triggered(event.condition.as_str());
                    events.push(event);
                } else {
                    debug!(alert_id = %rule.id, "규칙이 이미 처리되었거나 변경됨, 트리거 생략");
                }
            }
            RuleWrite::Observe { index } => {
                let rule = &rules[index];
                let Some(value) = rule.last_value else {
                    continue;
                };
                if let Err(e) = AlertRepository::save_observation(pool, rule.id, value, now).await {
                    error!(alert_id = %rule.id, error = %e, "알림 관찰 값 저장 실패");
                }
            }
        }
    }

    record_alert_check(rules.len(), started.elapsed().as_secs_f64());
    info!(
        evaluated = rules.len(),
        triggered = events.len(),
        quote_failures = quote_failures.len(),
        "알림 검사 완료"
    );

    Ok(AlertCheckSummary {
        evaluated: rules.len(),
        triggered: events.len(),
        quote_failures,
        events,
        checked_at: now,
    })
}

/// 알림 폴러 시작.
///
/// DB가 설정되지 않았으면 태스크를 시작하지 않습니다.
pub fn start_alert_poller(
    state: Arc<AppState>,
    config: AlertPollerConfig,
    shutdown_token: CancellationToken,
) -> Option<JoinHandle<()>> {
    if !state.has_db() {
        warn!("DB 미설정, 알림 폴러 비활성화");
        return None;
    }

    Some(tokio::spawn(async move {
        info!(
            interval_secs = config.poll_interval.as_secs(),
            initial_delay_secs = config.initial_delay.as_secs(),
            "알림 폴러 시작"
        );

        tokio::select! {
            _ = tokio::time::sleep(config.initial_delay) => {}
            _ = shutdown_token.cancelled() => {
                info!("알림 폴러: 종료 시그널 수신 (초기화 중)");
                return;
            }
        }

        let mut ticker = interval(config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = check_alerts(&state).await {
                        error!(error = %e, "알림 검사 실패");
                    }
                }
                _ = shutdown_token.cancelled() => {
                    info!("알림 폴러: 종료 시그널 수신");
                    break;
                }
            }
        }

        info!("알림 폴러 종료됨");
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;
    use watch_core::{AlertCondition, AlertStatus};

    use crate::state::create_test_state;

    fn symbol(s: &str) -> StockSymbol {
        StockSymbol::parse(s).unwrap()
    }

    fn quotes(entries: &[(&str, rust_decimal::Decimal, rust_decimal::Decimal)]) -> HashMap<StockSymbol, Quote> {
        entries
            .iter()
            .map(|(s, price, prev)| (symbol(s), Quote::new(symbol(s), *price, Some(*prev))))
            .collect()
    }

    fn triggered(writes: &[RuleWrite]) -> Vec<&AlertEvent> {
        writes
            .iter()
            .filter_map(|w| match w {
                RuleWrite::Trigger { event, .. } => Some(event),
                RuleWrite::Observe { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_threshold_trigger_is_one_shot() {
        let now = Utc::now();
        let mut rules = vec![AlertRule::new(symbol("AAPL"), AlertCondition::PriceAbove, dec!(200))];

        let writes = evaluate_rules(&mut rules, &quotes(&[("AAPL", dec!(201), dec!(199))]), now);
        assert_eq!(writes.len(), 1);
        assert_eq!(rules[0].status, AlertStatus::Triggered);
        let events = triggered(&writes);
        assert_eq!(events[0].alert_id, rules[0].id);

        let writes = evaluate_rules(
            &mut rules,
            &quotes(&[("AAPL", dec!(205), dec!(199))]),
            now + ChronoDuration::minutes(15),
        );
        assert!(triggered(&writes).is_empty());
    }

    #[test]
    fn test_cross_needs_previous_observation() {
        let now = Utc::now();
        let mut rules = vec![AlertRule::new(symbol("MSFT"), AlertCondition::PriceCrossAbove, dec!(400))];

        // 첫 회차: 이전 값이 없으므로 트리거 없이 기준값만 기록
        let writes = evaluate_rules(&mut rules, &quotes(&[("MSFT", dec!(390), dec!(395))]), now);
        assert!(matches!(writes.as_slice(), [RuleWrite::Observe { index: 0 }]));
        assert_eq!(rules[0].last_value, Some(390.0));

        let writes = evaluate_rules(
            &mut rules,
            &quotes(&[("MSFT", dec!(405), dec!(395))]),
            now + ChronoDuration::minutes(15),
        );
        let events = triggered(&writes);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].observed_value, 405.0);
    }

    #[test]
    fn test_repeatable_respects_cooldown() {
        let now = Utc::now();
        let mut rules = vec![AlertRule::new(symbol("TSLA"), AlertCondition::ChangePctBelow, dec!(-5))
            .with_repeatable(true, Some(3600))];
        let crash = quotes(&[("TSLA", dec!(90), dec!(100))]);

        assert_eq!(triggered(&evaluate_rules(&mut rules, &crash, now)).len(), 1);
        assert_eq!(rules[0].status, AlertStatus::Active);

        let writes = evaluate_rules(&mut rules, &crash, now + ChronoDuration::minutes(15));
        assert!(triggered(&writes).is_empty());

        let writes = evaluate_rules(&mut rules, &crash, now + ChronoDuration::minutes(61));
        assert_eq!(triggered(&writes).len(), 1);
    }

    #[test]
    fn test_trigger_carries_previously_read_trigger_time() {
        let now = Utc::now();
        let mut rules = vec![AlertRule::new(symbol("AMD"), AlertCondition::PriceBelow, dec!(100))
            .with_repeatable(true, Some(600))];
        let dip = quotes(&[("AMD", dec!(95), dec!(101))]);

        match evaluate_rules(&mut rules, &dip, now).as_slice() {
            [RuleWrite::Trigger { previous_trigger, .. }] => assert_eq!(*previous_trigger, None),
            other => panic!("unexpected writes: {:?}", other),
        }

        // 재트리거 시 저장 조건은 직전 트리거 시각
        let later = now + ChronoDuration::minutes(15);
        match evaluate_rules(&mut rules, &dip, later).as_slice() {
            [RuleWrite::Trigger { previous_trigger, .. }] => {
                assert_eq!(*previous_trigger, Some(now))
            }
            other => panic!("unexpected writes: {:?}", other),
        }
        assert_eq!(rules[0].last_triggered_at, Some(later));
    }

    #[test]
    fn test_missing_quote_leaves_rule_untouched() {
        let mut rules = vec![AlertRule::new(symbol("NVDA"), AlertCondition::PriceBelow, dec!(100))];
        let writes = evaluate_rules(&mut rules, &HashMap::new(), Utc::now());

        assert!(writes.is_empty());
        assert!(rules[0].last_value.is_none());
    }

    #[tokio::test]
    async fn test_check_alerts_requires_database() {
        let state = create_test_state();
        let result = check_alerts(&state).await;
        assert!(matches!(result, Err(AlertCheckError::DatabaseUnavailable)));
    }

    #[test]
    fn test_poller_not_started_without_db() {
        let state = Arc::new(create_test_state());
        let handle = start_alert_poller(state, AlertPollerConfig::default(), CancellationToken::new());
        assert!(handle.is_none());
    }

    #[test]
    fn test_default_interval_is_fifteen_minutes() {
        assert_eq!(AlertPollerConfig::default().poll_interval, Duration::from_secs(900));
    }
}
