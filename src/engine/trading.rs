/// Hybrid trading engine: periodic analysis, strategy composition,
/// the six-layer execution guard and the safety latch
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analytics::PerformanceTracker;
use crate::broker::client::BrokerEvent;
use crate::broker::BrokerAdapter;
use crate::config::Config;
use crate::data::MtfStore;
use crate::engine::inflight::{InFlightRegistry, InFlightStatus};
use crate::error::{BotError, Result};
use crate::events::{DecisionLogger, LogEvent};
use crate::risk::RiskManager;
use crate::smc::SmcStrategy;
use crate::store::StateStore;
use crate::strategy::RsiVwapStrategy;
use crate::types::{
    Bar, EngineStatus, MtfBundle, OrderRequest, OrderType, Position, PositionStatus,
    StrategySignal, Timeframe, TradeDirection,
};
use crate::utils::pip::{distance_pips, pip_value_usd};
use crate::utils::time::floor_to_candle;

const HISTORY_BARS: u32 = 250;
const MIN_H1_BARS: usize = 50;
const MIN_M15_BARS: usize = 30;
const MIN_M5_BARS: usize = 20;

const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);
const RATE_LIMIT_ATTEMPTS: usize = 3;
const PERFORMANCE_LOG_EVERY: u64 = 10;

/// Outcome of composing the two strategies under the fixed priority
#[derive(Debug)]
pub(crate) enum Combined {
    Stand,
    Conflict {
        smc: TradeDirection,
        rsi: TradeDirection,
    },
    Chosen {
        signal: StrategySignal,
        source: &'static str,
    },
}

/// SMC wins ties; opposite directions cancel each other out.
pub(crate) fn combine_signals(smc: StrategySignal, rsi: StrategySignal) -> Combined {
    match (smc.direction, rsi.direction) {
        (Some(s), Some(r)) if s == r => Combined::Chosen {
            signal: smc,
            source: "SMC",
        },
        (Some(s), Some(r)) => Combined::Conflict { smc: s, rsi: r },
        (Some(_), None) => Combined::Chosen {
            signal: smc,
            source: "SMC",
        },
        (None, Some(_)) => Combined::Chosen {
            signal: rsi,
            source: "RSI_VWAP",
        },
        (None, None) => Combined::Stand,
    }
}

pub struct TradingEngine {
    config: Arc<Config>,
    adapter: Arc<BrokerAdapter>,
    mtf: Arc<MtfStore>,
    risk: Arc<RiskManager>,
    smc: Arc<SmcStrategy>,
    rsi_vwap: RsiVwapStrategy,
    inflight: Arc<InFlightRegistry>,
    store: Arc<StateStore>,
    logger: Arc<DecisionLogger>,
    perf: Arc<PerformanceTracker>,

    running: RwLock<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    last_trade_time: RwLock<HashMap<String, i64>>,
    last_traded_candle: RwLock<HashMap<String, i64>>,
}

impl TradingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        adapter: Arc<BrokerAdapter>,
        mtf: Arc<MtfStore>,
        risk: Arc<RiskManager>,
        smc: Arc<SmcStrategy>,
        store: Arc<StateStore>,
        logger: Arc<DecisionLogger>,
    ) -> Arc<Self> {
        let rsi_vwap = RsiVwapStrategy::new(config.rsi_vwap.clone());
        let inflight = Arc::new(InFlightRegistry::new(
            config.engine.inflight_timeout_ms,
            Arc::clone(&logger),
        ));
        Arc::new(TradingEngine {
            config,
            adapter,
            mtf,
            risk,
            smc,
            rsi_vwap,
            inflight,
            store,
            logger,
            perf: Arc::new(PerformanceTracker::new()),
            running: RwLock::new(false),
            tasks: Mutex::new(Vec::new()),
            last_trade_time: RwLock::new(HashMap::new()),
            last_traded_candle: RwLock::new(HashMap::new()),
        })
    }

    /// Subscribe symbols, load history, initialize risk and start the
    /// analysis and data-refresh loops. Call with a clone of the Arc.
    pub async fn start(self: Arc<TradingEngine>) -> Result<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                return Err(BotError::InvariantViolation("engine already running".to_string()));
            }
            *running = true;
        }

        let symbols = self.config.engine.symbols.clone();
        info!("🚀 Trading engine starting for {:?}", symbols);

        self.store.set_active_symbols(&symbols).await?;

        for symbol in &symbols {
            if let Err(e) = self.adapter.subscribe_price(symbol).await {
                warn!("Price subscription failed for {}: {}", symbol, e);
            }
        }

        match self.adapter.get_account_info().await {
            Ok(account) => self.risk.initialize(account.equity).await?,
            Err(e) => warn!("Account info unavailable at start: {}", e),
        }

        // Initial history load, sequential with paced requests
        self.refresh_all_data().await;

        // Equity pump: trader updates keep the circuit breaker fed
        let engine = Arc::clone(&self);
        let equity_task = tokio::spawn(async move {
            let mut events = engine.adapter_events();
            loop {
                match events.recv().await {
                    Ok(BrokerEvent::TraderUpdate(update)) => {
                        if let Some(trader) = update.trader {
                            let scale = 10f64.powi(trader.money_digits.unwrap_or(2) as i32);
                            let equity =
                                trader.equity.map(|e| e as f64 / scale).unwrap_or(trader.balance as f64 / scale);
                            if let Err(e) = engine.risk.update_equity(equity).await {
                                warn!("Equity update failed: {}", e);
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // Analysis loop, every 30s
        let engine = Arc::clone(&self);
        let analysis_task = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(engine.config.engine.analysis_interval_secs));
            loop {
                interval.tick().await;
                if !engine.is_running().await {
                    break;
                }
                engine.run_analysis_cycle().await;
            }
            debug!("Analysis loop ended");
        });

        // Data refresh loop, every 5min
        let engine = Arc::clone(&self);
        let refresh_task = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(engine.config.engine.refresh_interval_secs));
            interval.tick().await;
            loop {
                interval.tick().await;
                if !engine.is_running().await {
                    break;
                }
                engine.refresh_all_data().await;
                match engine.adapter.get_account_info().await {
                    Ok(account) => {
                        if let Err(e) = engine.risk.update_equity(account.equity).await {
                            warn!("Equity update failed: {}", e);
                        }
                    }
                    Err(e) => debug!("Account info refresh failed: {}", e),
                }
            }
            debug!("Data refresh loop ended");
        });

        {
            let mut tasks = self.tasks.lock().await;
            tasks.push(equity_task);
            tasks.push(analysis_task);
            tasks.push(refresh_task);
        }

        info!("✅ Trading engine running");
        Ok(())
    }

    /// Cancel the loops, unsubscribe, and clear in-flight records.
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }
        info!("🛑 Trading engine stopping...");

        {
            let mut tasks = self.tasks.lock().await;
            for task in tasks.drain(..) {
                task.abort();
            }
        }

        self.adapter.unsubscribe_all().await;
        self.inflight.clear_all("engine stopped").await;
        info!("✅ Trading engine stopped");
    }

    pub async fn is_running(&self) -> bool {
        let running = self.running.read().await;
        *running
    }

    pub async fn status(&self) -> EngineStatus {
        let now_ms = Utc::now().timestamp_millis();
        let performance = self.perf.snapshot().await;
        EngineStatus {
            is_running: self.is_running().await,
            mode: "hybrid_smc".to_string(),
            symbols: self.config.engine.symbols.clone(),
            analysis_count: performance.analysis_count,
            trades_executed: performance.trades_executed,
            in_flight_orders: self.inflight.snapshot(now_ms).await,
            performance,
            risk: self.risk.snapshot().await,
        }
    }

    /// Admin passthrough
    pub async fn reset_circuit_breaker(&self) -> Result<()> {
        self.risk.reset_circuit_breaker().await
    }

    // ---- analysis ----

    async fn run_analysis_cycle(&self) {
        let started = std::time::Instant::now();
        let now_ms = Utc::now().timestamp_millis();

        // Watchdog runs on every tick, before any new acquisition
        self.inflight.watchdog_sweep(now_ms).await;

        for symbol in self.config.engine.symbols.clone() {
            if let Err(e) = self.analyze_symbol(&symbol).await {
                // A single-symbol failure never takes the engine down
                error!("Analysis failed for {}: {} ({})", symbol, e, e.error_code());
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as i64;
        self.perf.record_cycle(elapsed_ms).await;

        let snapshot = self.perf.snapshot().await;
        if snapshot.analysis_count % PERFORMANCE_LOG_EVERY == 0 {
            self.logger
                .log(&LogEvent::Performance {
                    analysis_count: snapshot.analysis_count,
                    trades_executed: snapshot.trades_executed,
                    conflicts: snapshot.conflicts,
                    avg_cycle_ms: snapshot.avg_cycle_ms,
                    last_cycle_ms: snapshot.last_cycle_ms,
                })
                .await;
        }
    }

    async fn analyze_symbol(&self, symbol: &str) -> Result<()> {
        let h1 = self.mtf.get_bars(symbol, Timeframe::H1, HISTORY_BARS as usize).await;
        let m15 = self.mtf.get_bars(symbol, Timeframe::M15, HISTORY_BARS as usize).await;
        let m5 = self.mtf.get_bars(symbol, Timeframe::M5, HISTORY_BARS as usize).await;

        if h1.len() < MIN_H1_BARS || m15.len() < MIN_M15_BARS || m5.len() < MIN_M5_BARS {
            debug!(
                "Skipping {}: short history (H1 {}, M15 {}, M5 {})",
                symbol,
                h1.len(),
                m15.len(),
                m5.len()
            );
            return Ok(());
        }

        let Some(tick) = self.adapter.latest_tick(symbol).await else {
            debug!("Skipping {}: no live quote yet", symbol);
            return Ok(());
        };
        let spread_pips = distance_pips(symbol, tick.ask, tick.bid);

        let bundle = MtfBundle {
            symbol: symbol.to_string(),
            h1,
            m15,
            m5,
            bid: tick.bid,
            ask: tick.ask,
            spread_pips,
        };

        let now = Utc::now();
        let smc_signal = self.smc.analyze(&bundle, now).await;
        let rsi_signal = self.rsi_vwap.analyze(&bundle, now);

        match combine_signals(smc_signal, rsi_signal) {
            Combined::Stand => Ok(()),
            Combined::Conflict { smc, rsi } => {
                self.perf.record_conflict().await;
                self.logger
                    .log(&LogEvent::Conflict {
                        symbol: symbol.to_string(),
                        smc: smc.as_str().to_string(),
                        rsi: rsi.as_str().to_string(),
                    })
                    .await;
                Ok(())
            }
            Combined::Chosen { signal, source } => {
                if signal.confidence < self.config.engine.min_confidence {
                    debug!(
                        "{} signal below confidence gate: {:.0} < {:.0}",
                        symbol, signal.confidence, self.config.engine.min_confidence
                    );
                    return Ok(());
                }
                self.perf.record_signal().await;
                self.execute_signal(symbol, signal, source).await
            }
        }
    }

    // ---- execution ----

    /// The atomic six-layer guard plus submission and safety latch.
    /// Everything after acquisition releases the lock with a reason.
    async fn execute_signal(
        &self,
        symbol: &str,
        signal: StrategySignal,
        source: &'static str,
    ) -> Result<()> {
        let now_ms = Utc::now().timestamp_millis();
        let direction = signal
            .direction
            .ok_or_else(|| BotError::InvariantViolation("executing flat signal".to_string()))?;

        let Some(correlation_id) = self.inflight.try_acquire(symbol, now_ms).await else {
            return Ok(());
        };

        // Layer 1: cooldown
        {
            let last_trades = self.last_trade_time.read().await;
            if let Some(last) = last_trades.get(symbol) {
                if now_ms - last < self.config.engine.cooldown_ms {
                    self.inflight
                        .release(symbol, InFlightStatus::Failed, "cooldown active")
                        .await;
                    return Ok(());
                }
            }
        }

        // Layer 2: one entry per M5 candle
        let candle = floor_to_candle(now_ms, Timeframe::M5);
        {
            let last_candles = self.last_traded_candle.read().await;
            if last_candles.get(symbol) == Some(&candle) {
                self.inflight
                    .release(symbol, InFlightStatus::Failed, "candle already traded")
                    .await;
                return Ok(());
            }
        }

        // Layer 3: risk gate
        let check = self.risk.can_open_position().await;
        if !check.allowed {
            info!("🛡️  Risk denied {} entry: {}", symbol, check.reason);
            self.inflight
                .release(symbol, InFlightStatus::Failed, &check.reason)
                .await;
            return Ok(());
        }

        // Layer 4: live broker reconciliation
        let open_positions = match self.adapter.reconcile_positions().await {
            Ok(_) => self.adapter.get_open_positions().await,
            Err(e) => {
                self.inflight
                    .release(symbol, InFlightStatus::Failed, &format!("reconcile failed: {}", e))
                    .await;
                return Ok(());
            }
        };
        self.risk.set_open_trades_count(open_positions.len()).await;
        self.store.replace_open_positions(&open_positions).await?;

        let symbol_open = open_positions.iter().filter(|p| p.symbol == symbol).count();
        if symbol_open >= self.config.engine.max_trades_per_symbol {
            self.inflight
                .release(symbol, InFlightStatus::Failed, "symbol position limit (broker)")
                .await;
            return Ok(());
        }

        // Layer 5: persisted-positions check
        let persisted = self.store.open_positions_for(symbol).await;
        if persisted.len() >= self.config.engine.max_trades_per_symbol {
            self.inflight
                .release(symbol, InFlightStatus::Failed, "symbol position limit (store)")
                .await;
            return Ok(());
        }

        // Layer 6: total position cap
        if open_positions.len() >= self.config.engine.max_positions {
            self.inflight
                .release(symbol, InFlightStatus::Failed, "total position limit")
                .await;
            return Ok(());
        }

        // Order preparation
        let account = match self.adapter.get_account_info().await {
            Ok(account) => account,
            Err(e) => {
                self.inflight
                    .release(symbol, InFlightStatus::Failed, &format!("balance unavailable: {}", e))
                    .await;
                return Ok(());
            }
        };

        let stop_loss_pips = signal
            .stop_loss_pips
            .unwrap_or(self.config.smc.stop_loss_pips);
        let take_profit_pips = signal
            .take_profit_pips
            .unwrap_or(stop_loss_pips * self.config.smc.risk_reward);

        let pip_value = pip_value_usd(symbol, 1.0, &self.config.risk.usd_rates);
        let volume_specs = self
            .adapter
            .get_symbol_info(symbol)
            .await
            .ok()
            .and_then(|(_, specs)| specs);
        let size =
            self.risk
                .calculate_position_size(account.balance, stop_loss_pips, pip_value, volume_specs);
        if !size.can_trade {
            self.inflight
                .release(symbol, InFlightStatus::Failed, &size.reason)
                .await;
            return Ok(());
        }

        let before: HashSet<i64> = open_positions
            .iter()
            .filter(|p| p.symbol == symbol)
            .map(|p| p.position_id)
            .collect();

        let order = OrderRequest {
            symbol: symbol.to_string(),
            direction,
            order_type: OrderType::Market,
            lots: size.lot_size,
            stop_loss_pips: Some(stop_loss_pips),
            take_profit_pips: Some(take_profit_pips),
            comment: format!("{} {:.0}%", source, signal.confidence),
        };

        self.inflight.mark_sent(symbol).await;
        info!(
            "📤 {} {} {:.2} lots ({}, confidence {:.0})",
            direction.as_str(),
            symbol,
            size.lot_size,
            source,
            signal.confidence
        );

        match self
            .adapter
            .place_order(&order, self.config.engine.max_spread_pips)
            .await
        {
            Ok(result) if result.success => {
                self.settle_success(
                    symbol,
                    &order,
                    &signal,
                    source,
                    &correlation_id,
                    result.position_id,
                    result.execution_price,
                    false,
                    now_ms,
                )
                .await;
                Ok(())
            }
            Ok(result) => {
                let message = result
                    .error_message
                    .unwrap_or_else(|| "order not confirmed".to_string());
                self.handle_submission_failure(
                    symbol,
                    &order,
                    &signal,
                    source,
                    &correlation_id,
                    &before,
                    &message,
                    now_ms,
                )
                .await;
                Ok(())
            }
            Err(e) => {
                self.handle_submission_failure(
                    symbol,
                    &order,
                    &signal,
                    source,
                    &correlation_id,
                    &before,
                    &e.to_string(),
                    now_ms,
                )
                .await;
                Ok(())
            }
        }
    }

    /// Safety latch: an opaque submission failure is success iff the
    /// broker now shows a position for the symbol that was not there
    /// before.
    #[allow(clippy::too_many_arguments)]
    async fn handle_submission_failure(
        &self,
        symbol: &str,
        order: &OrderRequest,
        signal: &StrategySignal,
        source: &'static str,
        correlation_id: &str,
        before: &HashSet<i64>,
        message: &str,
        now_ms: i64,
    ) {
        warn!("⚠️  Order submission failed for {}: {}", symbol, message);

        let latched = match self.adapter.reconcile_positions().await {
            Ok(positions) => positions
                .into_iter()
                .find(|p| p.symbol == symbol && p.status == PositionStatus::Open && !before.contains(&p.position_id)),
            Err(e) => {
                warn!("Safety-latch reconcile failed for {}: {}", symbol, e);
                None
            }
        };

        match latched {
            Some(position) => {
                warn!(
                    "🔒 Safety latch: broker shows position {} for {} despite failure",
                    position.position_id, symbol
                );
                self.settle_success(
                    symbol,
                    order,
                    signal,
                    source,
                    correlation_id,
                    Some(position.position_id),
                    Some(position.entry_price),
                    true,
                    now_ms,
                )
                .await;
            }
            None => {
                self.inflight
                    .release(symbol, InFlightStatus::Failed, message)
                    .await;
            }
        }
    }

    /// Exactly-once success bookkeeping for a filled entry
    #[allow(clippy::too_many_arguments)]
    async fn settle_success(
        &self,
        symbol: &str,
        order: &OrderRequest,
        signal: &StrategySignal,
        source: &'static str,
        correlation_id: &str,
        position_id: Option<i64>,
        execution_price: Option<f64>,
        safety_latch_triggered: bool,
        now_ms: i64,
    ) {
        {
            let mut last_trades = self.last_trade_time.write().await;
            last_trades.insert(symbol.to_string(), now_ms);
        }
        {
            let mut last_candles = self.last_traded_candle.write().await;
            last_candles.insert(symbol.to_string(), floor_to_candle(now_ms, Timeframe::M5));
        }

        self.perf.record_trade().await;
        if source == "SMC" {
            self.smc.notify_trade_executed(symbol, now_ms).await;
        }

        let entry_price = execution_price.unwrap_or(0.0);
        if let Some(position_id) = position_id {
            let position = Position {
                position_id,
                symbol: symbol.to_string(),
                direction: order.direction,
                volume_lots: order.lots,
                entry_price,
                stop_loss: None,
                take_profit: None,
                opened_at_ms: now_ms,
                status: PositionStatus::Open,
            };
            if let Err(e) = self.store.record_open_position(&position).await {
                warn!("Failed to persist position {}: {}", position_id, e);
            }
        }

        self.logger
            .log(&LogEvent::Trade {
                symbol: symbol.to_string(),
                direction: order.direction.as_str().to_string(),
                lots: order.lots,
                entry_price,
                stop_loss: order.stop_loss_pips,
                take_profit: order.take_profit_pips,
                confidence: signal.confidence,
                source: source.to_string(),
                correlation_id: correlation_id.to_string(),
                safety_latch_triggered,
            })
            .await;

        self.inflight
            .release(symbol, InFlightStatus::Confirmed, "order confirmed")
            .await;

        info!(
            "✅ Trade executed: {} {} {:.2} lots @ {:.5}{}",
            order.direction.as_str(),
            symbol,
            order.lots,
            entry_price,
            if safety_latch_triggered { " (safety latch)" } else { "" }
        );
    }

    // ---- data ----

    async fn refresh_all_data(&self) {
        for symbol in self.config.engine.symbols.clone() {
            for timeframe in [Timeframe::H1, Timeframe::M15, Timeframe::M5] {
                match self.fetch_with_retry(&symbol, timeframe).await {
                    Ok(bars) => {
                        self.mtf.merge_bars(&symbol, timeframe, &bars).await;
                    }
                    Err(e) => {
                        // Partial data is fine; the length gates skip
                        // symbols that fell too far behind
                        warn!(
                            "History fetch failed for {} {}: {}",
                            symbol,
                            timeframe.as_str(),
                            e
                        );
                    }
                }
            }
        }
    }

    /// Rate-limited fetches back off 5s and retry up to 3 attempts per
    /// symbol-timeframe before surfacing the error.
    async fn fetch_with_retry(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>> {
        let mut attempt = 0;
        loop {
            match self
                .adapter
                .get_candle_history(symbol, timeframe, HISTORY_BARS)
                .await
            {
                Ok(bars) => return Ok(bars),
                Err(BotError::RateLimit(message)) => {
                    attempt += 1;
                    if attempt >= RATE_LIMIT_ATTEMPTS {
                        return Err(BotError::RateLimit(message));
                    }
                    warn!(
                        "Rate limited on {} {} (attempt {}/{}) - backing off {}s",
                        symbol,
                        timeframe.as_str(),
                        attempt,
                        RATE_LIMIT_ATTEMPTS,
                        RATE_LIMIT_BACKOFF.as_secs()
                    );
                    tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn adapter_events(&self) -> tokio::sync::broadcast::Receiver<BrokerEvent> {
        self.adapter.client_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerClient;
    use crate::store::LogMirror;

    fn test_config() -> Arc<Config> {
        let toml = r#"
[broker]
client_id = "abc"
client_secret = "xyz"
access_token = "t"
is_demo = true

[engine]
symbols = ["EURUSD"]
max_positions = 3
max_trades_per_symbol = 1
cooldown_ms = 300000
max_spread_pips = 2.5

[risk]
risk_percentage = 1.0
daily_loss_limit_percent = 3.0
max_open_trades = 3
circuit_breaker_enabled = true
session_filter_enabled = false
london_start = "04:00"
london_end = "09:00"
ny_start = "09:30"
ny_end = "14:00"

[smc]

[rsi_vwap]

[store]
state_path = "unused"
log_path = "unused"
"#;
        Arc::new(toml::from_str(toml).unwrap())
    }

    fn offline_engine() -> (Arc<TradingEngine>, Arc<LogMirror>) {
        let config = test_config();
        let mirror = Arc::new(LogMirror::in_memory());
        let logger = Arc::new(DecisionLogger::new(Arc::clone(&mirror)));
        let client = Arc::new(BrokerClient::new());
        let adapter = crate::broker::BrokerAdapter::new(client);
        let store = Arc::new(StateStore::in_memory());
        let risk = Arc::new(RiskManager::new(config.risk.clone(), Arc::clone(&store)));
        let smc = Arc::new(SmcStrategy::new(config.smc.clone(), Arc::clone(&logger)));
        let mtf = Arc::new(MtfStore::new());
        let engine = TradingEngine::new(config, adapter, mtf, risk, smc, store, logger);
        (engine, mirror)
    }

    async fn released_reason(mirror: &LogMirror) -> Option<String> {
        mirror
            .entries()
            .await
            .iter()
            .find(|e| e["type"] == "LOCK_RELEASED")
            .and_then(|e| e["reason"].as_str().map(|s| s.to_string()))
    }

    fn sell_signal() -> StrategySignal {
        StrategySignal {
            direction: Some(TradeDirection::Sell),
            confidence: 80.0,
            reason: "test".to_string(),
            stop_loss_pips: Some(12.0),
            take_profit_pips: Some(24.0),
        }
    }

    #[tokio::test]
    async fn test_cooldown_layer_releases_lock() {
        let (engine, mirror) = offline_engine();
        engine.risk.initialize(10_000.0).await.unwrap();

        let now_ms = Utc::now().timestamp_millis();
        {
            let mut last = engine.last_trade_time.write().await;
            last.insert("EURUSD".to_string(), now_ms - 1_000);
        }

        engine.execute_signal("EURUSD", sell_signal(), "SMC").await.unwrap();
        assert_eq!(released_reason(&mirror).await.as_deref(), Some("cooldown active"));
        assert!(engine.inflight.snapshot(now_ms).await.is_empty());
    }

    #[tokio::test]
    async fn test_candle_gate_releases_lock() {
        let (engine, mirror) = offline_engine();
        engine.risk.initialize(10_000.0).await.unwrap();

        let now_ms = Utc::now().timestamp_millis();
        {
            let mut last = engine.last_traded_candle.write().await;
            last.insert("EURUSD".to_string(), floor_to_candle(now_ms, Timeframe::M5));
        }

        engine.execute_signal("EURUSD", sell_signal(), "SMC").await.unwrap();
        assert_eq!(
            released_reason(&mirror).await.as_deref(),
            Some("candle already traded")
        );
        assert!(engine.inflight.snapshot(now_ms).await.is_empty());
    }

    #[tokio::test]
    async fn test_risk_block_releases_lock() {
        let (engine, mirror) = offline_engine();
        engine.risk.initialize(10_000.0).await.unwrap();
        engine.risk.update_equity(9_600.0).await.unwrap();

        engine.execute_signal("EURUSD", sell_signal(), "SMC").await.unwrap();
        let reason = released_reason(&mirror).await.unwrap();
        assert!(reason.contains("daily loss limit"));
    }

    #[tokio::test]
    async fn test_downstream_failure_always_releases_lock() {
        let (engine, mirror) = offline_engine();
        engine.risk.initialize(10_000.0).await.unwrap();

        // No broker session: the reconciliation layer fails, and the
        // lock must not leak
        engine.execute_signal("EURUSD", sell_signal(), "SMC").await.unwrap();
        let reason = released_reason(&mirror).await.unwrap();
        assert!(reason.contains("reconcile failed"));

        let now_ms = Utc::now().timestamp_millis();
        assert!(engine.inflight.snapshot(now_ms).await.is_empty());
        // And the next attempt can acquire again
        assert!(engine.inflight.try_acquire("EURUSD", now_ms).await.is_some());
    }

    fn signal(direction: Option<TradeDirection>, confidence: f64) -> StrategySignal {
        StrategySignal {
            direction,
            confidence,
            reason: "test".to_string(),
            stop_loss_pips: Some(10.0),
            take_profit_pips: Some(20.0),
        }
    }

    #[test]
    fn test_smc_wins_when_only_smc_valid() {
        let combined = combine_signals(
            signal(Some(TradeDirection::Sell), 80.0),
            signal(None, 0.0),
        );
        match combined {
            Combined::Chosen { source, signal } => {
                assert_eq!(source, "SMC");
                assert_eq!(signal.direction, Some(TradeDirection::Sell));
            }
            other => panic!("expected SMC chosen, got {:?}", other),
        }
    }

    #[test]
    fn test_rsi_wins_when_only_rsi_valid() {
        let combined = combine_signals(
            signal(None, 0.0),
            signal(Some(TradeDirection::Buy), 60.0),
        );
        match combined {
            Combined::Chosen { source, .. } => assert_eq!(source, "RSI_VWAP"),
            other => panic!("expected RSI chosen, got {:?}", other),
        }
    }

    #[test]
    fn test_same_direction_prefers_smc() {
        let combined = combine_signals(
            signal(Some(TradeDirection::Buy), 70.0),
            signal(Some(TradeDirection::Buy), 90.0),
        );
        match combined {
            Combined::Chosen { source, signal } => {
                assert_eq!(source, "SMC");
                assert_eq!(signal.confidence, 70.0);
            }
            other => panic!("expected SMC chosen, got {:?}", other),
        }
    }

    #[test]
    fn test_opposite_directions_conflict() {
        let combined = combine_signals(
            signal(Some(TradeDirection::Sell), 80.0),
            signal(Some(TradeDirection::Buy), 80.0),
        );
        match combined {
            Combined::Conflict { smc, rsi } => {
                assert_eq!(smc, TradeDirection::Sell);
                assert_eq!(rsi, TradeDirection::Buy);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_no_signals_stand() {
        let combined = combine_signals(signal(None, 0.0), signal(None, 0.0));
        assert!(matches!(combined, Combined::Stand));
    }
}
