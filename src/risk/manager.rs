/// Risk management: daily-equity baseline, loss circuit breaker,
/// session filter and position sizing
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::America::Sao_Paulo;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::RiskConfig;
use crate::error::Result;
use crate::store::StateStore;
use crate::types::{RiskSnapshot, VolumeSpecs};
use crate::utils::parse_clock;

const STATE_KEY: &str = "risk_state";

const DEFAULT_MIN_LOT: f64 = 0.01;
const DEFAULT_MAX_LOT: f64 = 10.0;
const DEFAULT_STEP_LOT: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct RiskState {
    pub daily_start_equity: f64,
    pub current_equity: f64,
    pub daily_pnl: f64,
    pub daily_pnl_percent: f64,
    pub open_trades_count: usize,
    pub trading_blocked: bool,
    pub block_reason: Option<String>,
    pub last_reset_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct CanOpen {
    pub allowed: bool,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PositionSize {
    pub lot_size: f64,
    pub risk_usd: f64,
    pub risk_percent: f64,
    pub can_trade: bool,
    pub reason: String,
}

pub struct RiskManager {
    config: RiskConfig,
    store: Arc<StateStore>,
    state: RwLock<RiskState>,
}

impl RiskManager {
    pub fn new(config: RiskConfig, store: Arc<StateStore>) -> Self {
        RiskManager {
            config,
            store,
            state: RwLock::new(RiskState {
                daily_start_equity: 0.0,
                current_equity: 0.0,
                daily_pnl: 0.0,
                daily_pnl_percent: 0.0,
                open_trades_count: 0,
                trading_blocked: false,
                block_reason: None,
                last_reset_date: Utc::now().date_naive(),
            }),
        }
    }

    /// On a new UTC date, reset the baseline and unblock; otherwise
    /// restore the persisted baseline and breaker flag.
    pub async fn initialize(&self, current_equity: f64) -> Result<()> {
        let today = Utc::now().date_naive();
        let persisted = self.store.get(STATE_KEY).await;

        let mut state = self.state.write().await;
        state.current_equity = current_equity;

        let restored = persisted.and_then(|value| {
            let date = value.get("date")?.as_str()?.parse::<NaiveDate>().ok()?;
            let baseline = value.get("daily_start_equity")?.as_f64()?;
            let blocked = value.get("trading_blocked")?.as_bool()?;
            let reason = value
                .get("block_reason")
                .and_then(|r| r.as_str())
                .map(|s| s.to_string());
            Some((date, baseline, blocked, reason))
        });

        match restored {
            Some((date, baseline, blocked, reason)) if date == today => {
                state.daily_start_equity = baseline;
                state.trading_blocked = blocked;
                state.block_reason = reason;
                state.last_reset_date = date;
                state.daily_pnl = current_equity - baseline;
                state.daily_pnl_percent = if baseline > 0.0 {
                    state.daily_pnl / baseline * 100.0
                } else {
                    0.0
                };
                info!(
                    "🛡️  Risk state restored: baseline {:.2}, blocked={}",
                    baseline, blocked
                );
            }
            _ => {
                state.daily_start_equity = current_equity;
                state.trading_blocked = false;
                state.block_reason = None;
                state.last_reset_date = today;
                state.daily_pnl = 0.0;
                state.daily_pnl_percent = 0.0;
                info!("🛡️  New trading day: baseline equity {:.2}", current_equity);
            }
        }

        let snapshot = state.clone();
        drop(state);
        self.persist(&snapshot).await
    }

    /// Refresh PnL against the daily baseline; trips the breaker when
    /// the daily loss limit is reached.
    pub async fn update_equity(&self, equity: f64) -> Result<()> {
        let today = Utc::now().date_naive();
        let mut state = self.state.write().await;

        if today != state.last_reset_date {
            state.daily_start_equity = equity;
            state.trading_blocked = false;
            state.block_reason = None;
            state.last_reset_date = today;
            info!("🛡️  UTC date rolled: new baseline equity {:.2}", equity);
        }

        state.current_equity = equity;
        state.daily_pnl = equity - state.daily_start_equity;
        state.daily_pnl_percent = if state.daily_start_equity > 0.0 {
            state.daily_pnl / state.daily_start_equity * 100.0
        } else {
            0.0
        };

        if self.config.circuit_breaker_enabled
            && !state.trading_blocked
            && state.daily_pnl_percent <= -self.config.daily_loss_limit_percent
        {
            state.trading_blocked = true;
            state.block_reason = Some(format!(
                "daily loss limit reached: {:.2}% <= -{:.2}%",
                state.daily_pnl_percent, self.config.daily_loss_limit_percent
            ));
            warn!(
                "🚨 CIRCUIT BREAKER: {:.2}% daily loss - trading blocked",
                state.daily_pnl_percent
            );
        }

        let snapshot = state.clone();
        drop(state);
        self.persist(&snapshot).await
    }

    pub async fn can_open_position(&self) -> CanOpen {
        self.can_open_position_at(Utc::now()).await
    }

    pub async fn can_open_position_at(&self, now: DateTime<Utc>) -> CanOpen {
        let mut state = self.state.write().await;

        if state.trading_blocked {
            return CanOpen {
                allowed: false,
                reason: state
                    .block_reason
                    .clone()
                    .unwrap_or_else(|| "trading blocked".to_string()),
            };
        }

        if state.open_trades_count >= self.config.max_open_trades {
            return CanOpen {
                allowed: false,
                reason: format!(
                    "max open trades reached ({}/{})",
                    state.open_trades_count, self.config.max_open_trades
                ),
            };
        }

        if self.config.session_filter_enabled && !self.in_trading_session(now) {
            return CanOpen {
                allowed: false,
                reason: "outside London/NY trading sessions".to_string(),
            };
        }

        // Loss check doubles as the breaker trigger so a stale equity
        // feed cannot let trades through past the limit
        if self.config.circuit_breaker_enabled
            && state.daily_pnl_percent <= -self.config.daily_loss_limit_percent
        {
            let reason = format!(
                "daily loss limit reached: {:.2}% <= -{:.2}%",
                state.daily_pnl_percent, self.config.daily_loss_limit_percent
            );
            state.trading_blocked = true;
            state.block_reason = Some(reason.clone());
            return CanOpen {
                allowed: false,
                reason,
            };
        }

        CanOpen {
            allowed: true,
            reason: "ok".to_string(),
        }
    }

    /// Risk-based sizing. Rounds down to the step, clamps to broker
    /// bounds, and refuses rather than rounding up past the risked
    /// amount.
    pub fn calculate_position_size(
        &self,
        balance: f64,
        stop_loss_pips: f64,
        pip_value_per_lot: f64,
        volume_specs: Option<VolumeSpecs>,
    ) -> PositionSize {
        let risk_percent = self.config.risk_percentage;
        let risk_usd = balance * risk_percent / 100.0;

        if stop_loss_pips <= 0.0 || pip_value_per_lot <= 0.0 {
            return PositionSize {
                lot_size: 0.0,
                risk_usd,
                risk_percent,
                can_trade: false,
                reason: "invalid stop distance or pip value".to_string(),
            };
        }

        let raw_lots = risk_usd / (stop_loss_pips * pip_value_per_lot);

        let (min_lot, max_lot, step) = match volume_specs {
            Some(specs) => (
                DEFAULT_MIN_LOT.max(specs.min_volume),
                DEFAULT_MAX_LOT.min(specs.max_volume),
                if specs.step_volume > 0.0 {
                    specs.step_volume
                } else {
                    DEFAULT_STEP_LOT
                },
            ),
            None => (DEFAULT_MIN_LOT, DEFAULT_MAX_LOT, DEFAULT_STEP_LOT),
        };

        let floored = (raw_lots / step).floor() * step;
        // Guard against float dust like 0.09999999
        let floored = (floored / step).round() * step;

        if floored < min_lot {
            return PositionSize {
                lot_size: 0.0,
                risk_usd,
                risk_percent,
                can_trade: false,
                reason: format!(
                    "computed size {:.4} lots below minimum {:.2}",
                    raw_lots, min_lot
                ),
            };
        }

        let lot_size = floored.min(max_lot);
        PositionSize {
            lot_size,
            risk_usd,
            risk_percent,
            can_trade: true,
            reason: "ok".to_string(),
        }
    }

    pub async fn set_open_trades_count(&self, count: usize) {
        let mut state = self.state.write().await;
        state.open_trades_count = count;
    }

    /// Admin operation
    pub async fn reset_circuit_breaker(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.trading_blocked = false;
        state.block_reason = None;
        let snapshot = state.clone();
        drop(state);
        info!("🛡️  Circuit breaker reset by admin");
        self.persist(&snapshot).await
    }

    pub async fn snapshot(&self) -> RiskSnapshot {
        let state = self.state.read().await;
        RiskSnapshot {
            daily_pnl: state.daily_pnl,
            daily_pnl_percent: state.daily_pnl_percent,
            open_trades: state.open_trades_count,
            trading_blocked: state.trading_blocked,
        }
    }

    pub async fn is_blocked(&self) -> bool {
        let state = self.state.read().await;
        state.trading_blocked
    }

    /// Brasília wall clock inside either configured session window
    fn in_trading_session(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&Sao_Paulo).time();

        let window = |start: &str, end: &str| -> bool {
            match (parse_clock(start), parse_clock(end)) {
                (Some(s), Some(e)) => local >= s && local < e,
                _ => false,
            }
        };

        window(&self.config.london_start, &self.config.london_end)
            || window(&self.config.ny_start, &self.config.ny_end)
    }

    async fn persist(&self, state: &RiskState) -> Result<()> {
        self.store
            .put(
                STATE_KEY,
                serde_json::json!({
                    "date": state.last_reset_date.to_string(),
                    "daily_start_equity": state.daily_start_equity,
                    "trading_blocked": state.trading_blocked,
                    "block_reason": state.block_reason,
                }),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> RiskConfig {
        RiskConfig {
            risk_percentage: 1.0,
            daily_loss_limit_percent: 3.0,
            max_open_trades: 3,
            circuit_breaker_enabled: true,
            session_filter_enabled: false,
            london_start: "04:00".to_string(),
            london_end: "09:00".to_string(),
            ny_start: "09:30".to_string(),
            ny_end: "14:00".to_string(),
            usd_rates: Default::default(),
        }
    }

    fn manager() -> RiskManager {
        RiskManager::new(config(), Arc::new(StateStore::in_memory()))
    }

    #[tokio::test]
    async fn test_circuit_breaker_trips_at_limit() {
        let rm = manager();
        rm.initialize(10_000.0).await.unwrap();

        rm.update_equity(9_800.0).await.unwrap();
        assert!(!rm.is_blocked().await);
        assert!(rm.can_open_position().await.allowed);

        // -3.1% breaches the 3.0% limit
        rm.update_equity(9_690.0).await.unwrap();
        assert!(rm.is_blocked().await);

        let check = rm.can_open_position().await;
        assert!(!check.allowed);
        assert!(check.reason.contains("daily loss limit"));
    }

    #[tokio::test]
    async fn test_block_is_monotonic_until_reset() {
        let rm = manager();
        rm.initialize(10_000.0).await.unwrap();
        rm.update_equity(9_600.0).await.unwrap();
        assert!(rm.is_blocked().await);

        // Equity recovering does not unblock within the day
        rm.update_equity(10_500.0).await.unwrap();
        assert!(rm.is_blocked().await);
        assert!(!rm.can_open_position().await.allowed);

        rm.reset_circuit_breaker().await.unwrap();
        assert!(!rm.is_blocked().await);
        assert!(rm.can_open_position().await.allowed);
    }

    #[tokio::test]
    async fn test_restore_blocked_state_same_day() {
        let store = Arc::new(StateStore::in_memory());
        let rm = RiskManager::new(config(), Arc::clone(&store));
        rm.initialize(10_000.0).await.unwrap();
        rm.update_equity(9_600.0).await.unwrap();
        assert!(rm.is_blocked().await);

        // Same store, fresh manager: the flag survives a restart
        let rm2 = RiskManager::new(config(), store);
        rm2.initialize(9_600.0).await.unwrap();
        assert!(rm2.is_blocked().await);
    }

    #[tokio::test]
    async fn test_max_open_trades() {
        let rm = manager();
        rm.initialize(10_000.0).await.unwrap();
        rm.set_open_trades_count(3).await;

        let check = rm.can_open_position().await;
        assert!(!check.allowed);
        assert!(check.reason.contains("max open trades"));
    }

    #[tokio::test]
    async fn test_session_filter() {
        let mut cfg = config();
        cfg.session_filter_enabled = true;
        let rm = RiskManager::new(cfg, Arc::new(StateStore::in_memory()));
        rm.initialize(10_000.0).await.unwrap();

        // 08:00 Brasília (11:00 UTC) is inside the London window
        let inside = Utc.with_ymd_and_hms(2025, 6, 10, 11, 0, 0).unwrap();
        assert!(rm.can_open_position_at(inside).await.allowed);

        // 20:00 Brasília (23:00 UTC) is outside both windows
        let outside = Utc.with_ymd_and_hms(2025, 6, 10, 23, 0, 0).unwrap();
        let check = rm.can_open_position_at(outside).await;
        assert!(!check.allowed);
        assert!(check.reason.contains("sessions"));
    }

    #[tokio::test]
    async fn test_position_sizing_defaults() {
        let rm = manager();
        // 10k balance, 1% risk = 100 USD; 20 pips at 10 USD/pip/lot
        // -> 0.5 lots exactly
        let size = rm.calculate_position_size(10_000.0, 20.0, 10.0, None);
        assert!(size.can_trade);
        assert!((size.lot_size - 0.5).abs() < 1e-9);
        assert!((size.risk_usd - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_position_sizing_floors_to_step() {
        let rm = manager();
        // 100 / (30 * 10) = 0.3333 -> floored to 0.33
        let size = rm.calculate_position_size(10_000.0, 30.0, 10.0, None);
        assert!(size.can_trade);
        assert!((size.lot_size - 0.33).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_position_sizing_collapses_below_minimum() {
        let rm = manager();
        // 100 / (200 * 100) = 0.005 lots -> below 0.01 minimum
        let size = rm.calculate_position_size(10_000.0, 200.0, 100.0, None);
        assert!(!size.can_trade);
        assert_eq!(size.lot_size, 0.0);
        assert!(size.reason.contains("below minimum"));
    }

    #[tokio::test]
    async fn test_position_sizing_honors_broker_specs() {
        let rm = manager();
        let specs = VolumeSpecs {
            min_volume: 0.1,
            max_volume: 2.0,
            step_volume: 0.1,
        };
        // Raw 0.5 -> step 0.1 keeps 0.5; clamp window [0.1, 2.0]
        let size = rm.calculate_position_size(10_000.0, 20.0, 10.0, Some(specs));
        assert!(size.can_trade);
        assert!((size.lot_size - 0.5).abs() < 1e-9);

        // Raw 0.05 -> below broker minimum 0.1
        let small = rm.calculate_position_size(1_000.0, 20.0, 10.0, Some(specs));
        assert!(!small.can_trade);

        // Huge raw size clamps to min(10, broker max 2.0)
        let big = rm.calculate_position_size(1_000_000.0, 20.0, 10.0, Some(specs));
        assert!(big.can_trade);
        assert!((big.lot_size - 2.0).abs() < 1e-9);
    }
}
