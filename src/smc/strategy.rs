/// Per-symbol SMC orchestration: feeds closed candles through the
/// session, liquidity, structure and FVG engines and drives the entry
/// FSM. Only closed candles advance anything here.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::SmcConfig;
use crate::events::{DecisionLogger, LogEvent};
use crate::smc::context::{ContextDecision, ContextEngine, SessionGrade};
use crate::smc::fsm::{
    state_timeout_min, transition, InstEvent, InstState, Outcome, TransitionLog, TransitionRecord,
};
use crate::smc::fvg::{update_zone, FvgEngine, FvgZone};
use crate::smc::liquidity::{detect_sweeps, LiquidityEngine, LiquidityPool, SweepEvent};
use crate::smc::session::{previous_day_levels, SessionTracker};
use crate::smc::structure::{detect_choch, find_swings, ChochSignal};
use crate::types::{Bar, MtfBundle, StrategySignal, Timeframe};
use crate::utils::time::closed_bars;

struct SymbolState {
    session: SessionTracker,
    pools: Vec<LiquidityPool>,
    state: InstState,
    state_changed_at_ms: i64,
    transitions: TransitionLog,
    active_sweep: Option<SweepEvent>,
    active_choch: Option<ChochSignal>,
    active_fvg: Option<FvgZone>,
    choch_consumed: bool,
    trades_this_session: usize,
    session_trade_history: Vec<i64>,
    last_m15_ms: i64,
    last_m5_ms: i64,
    booted: bool,
}

impl SymbolState {
    fn new(now_ms: i64) -> Self {
        SymbolState {
            session: SessionTracker::new(),
            pools: Vec::new(),
            state: InstState::Idle,
            state_changed_at_ms: now_ms,
            transitions: TransitionLog::default(),
            active_sweep: None,
            active_choch: None,
            active_fvg: None,
            choch_consumed: false,
            trades_this_session: 0,
            session_trade_history: Vec::new(),
            last_m15_ms: 0,
            last_m5_ms: 0,
            booted: false,
        }
    }
}

pub struct SmcStrategy {
    config: SmcConfig,
    logger: Arc<DecisionLogger>,
    context_engine: ContextEngine,
    liquidity_engine: LiquidityEngine,
    fvg_engine: FvgEngine,
    symbols: Mutex<HashMap<String, SymbolState>>,
}

impl SmcStrategy {
    pub fn new(config: SmcConfig, logger: Arc<DecisionLogger>) -> Self {
        let context_engine = ContextEngine::new(config.min_session_range_pips);
        let liquidity_engine = LiquidityEngine::new(config.max_swing_pools);
        let fvg_engine = FvgEngine::new(config.min_gap_pips);
        SmcStrategy {
            config,
            logger,
            context_engine,
            liquidity_engine,
            fvg_engine,
            symbols: Mutex::new(HashMap::new()),
        }
    }

    /// One analysis pass for one symbol. FSM transitions are totally
    /// ordered per symbol because the state sits behind this mutex and
    /// closed-bar watermarks only move forward.
    pub async fn analyze(&self, bundle: &MtfBundle, now: DateTime<Utc>) -> StrategySignal {
        let now_ms = now.timestamp_millis();
        let mut guard = self.symbols.lock().await;
        let st = guard
            .entry(bundle.symbol.clone())
            .or_insert_with(|| SymbolState::new(now_ms));

        let m15 = closed_bars(&bundle.m15, Timeframe::M15, now_ms);
        let m5 = closed_bars(&bundle.m5, Timeframe::M5, now_ms);
        if m15.is_empty() {
            return StrategySignal::flat("no closed M15 data");
        }

        let symbol = bundle.symbol.clone();

        if !st.booted {
            st.session.bootstrap(&m15, now);
            st.booted = true;
            self.emit_status(&symbol, st, "boot").await;
        }

        // Closed M15 bars drive sessions and sweep confirmation. Pools
        // are rebuilt at each rollover so a sweep landing in the same
        // cycle still sees the fresh session levels.
        let mut sweep_events: Vec<SweepEvent> = Vec::new();
        let mut rolled = false;
        for idx in 0..m15.len() {
            let bar = m15[idx].clone();
            if bar.timestamp_ms <= st.last_m15_ms {
                continue;
            }
            if st.session.update(&bar) {
                rolled = true;
                st.trades_this_session = 0;
                st.session_trade_history.clear();
                st.choch_consumed = false;
                if st.state != InstState::Idle {
                    self.apply_event(&symbol, st, InstEvent::SessionRollover, now_ms)
                        .await;
                }
                st.active_sweep = None;
                st.active_choch = None;
                st.active_fvg = None;
                self.rebuild_pools(&symbol, st, &m15[..=idx], now, now_ms).await;
            }
            sweep_events.extend(detect_sweeps(&mut st.pools, &bar, now_ms));
            st.last_m15_ms = bar.timestamp_ms;
        }

        // Keep swing pools fresh even without a rollover
        self.rebuild_pools(&symbol, st, &m15, now, now_ms).await;

        if rolled {
            self.emit_status(&symbol, st, "session_change").await;
        }

        // Sweeps only arm setups for the session they happened in
        if let Some(current) = st.session.current() {
            let start = current.start_time_ms;
            sweep_events.retain(|e| e.candle_ms >= start);
        }

        // Closed M5 bars advance the active FVG zone
        let last_m5_ms = st.last_m5_ms;
        for bar in m5.iter().filter(|b| b.timestamp_ms > last_m5_ms) {
            if let Some(zone) = st.active_fvg.as_mut() {
                update_zone(zone, bar);
            }
            st.last_m5_ms = bar.timestamp_ms;
        }

        let current_price = (bundle.bid + bundle.ask) / 2.0;
        let context: Option<ContextDecision> = st
            .session
            .previous()
            .map(|prev| self.context_engine.evaluate(&symbol, prev, current_price));

        // Context degradation tears down any armed setup
        if let Some(ctx) = &context {
            if !ctx.can_trade && st.state != InstState::Idle {
                self.apply_event(&symbol, st, InstEvent::ContextRejected, now_ms)
                    .await;
            }
        }

        // Watchdog: per-state timeout
        if let Some(timeout_min) = state_timeout_min(st.state, &self.config) {
            if now_ms - st.state_changed_at_ms >= timeout_min * 60_000 {
                let event = if st.state == InstState::Cooldown {
                    InstEvent::CooldownElapsed
                } else {
                    InstEvent::StateTimeout
                };
                self.apply_event(&symbol, st, event, now_ms).await;
            }
        }

        // Advance as far as this cycle's closed evidence allows
        for _ in 0..6 {
            let event = self.next_event(st, &context, &mut sweep_events, &m15, &m5, &symbol);
            match event {
                Some(event) => {
                    self.apply_event(&symbol, st, event, now_ms).await;
                }
                None => break,
            }
        }

        self.signal_for(&symbol, st, &context)
    }

    /// The engine reports an executed entry; the FSM enters cooldown.
    pub async fn notify_trade_executed(&self, symbol: &str, now_ms: i64) {
        let mut guard = self.symbols.lock().await;
        let Some(st) = guard.get_mut(symbol) else {
            return;
        };
        if st.state != InstState::WaitEntry {
            return;
        }

        let direction = st
            .active_sweep
            .as_ref()
            .map(|s| s.direction.trade_direction().as_str().to_string());
        let pool_key = st.active_sweep.as_ref().map(|s| s.pool_key.clone());
        let fvg_id = st.active_fvg.as_ref().map(|z| z.id.clone());
        let choch_price = st.active_choch.as_ref().map(|c| c.price);

        self.apply_event(symbol, st, InstEvent::TradeExecuted, now_ms)
            .await;
        st.trades_this_session += 1;
        st.session_trade_history.push(now_ms);
        st.choch_consumed = true;

        self.logger
            .log(&LogEvent::SmcDecision {
                symbol: symbol.to_string(),
                decision: "TRADE".to_string(),
                direction,
                reason: "entry executed after mitigation".to_string(),
                pool_key,
                fvg_id,
                choch_price,
            })
            .await;
    }

    pub async fn fsm_phase(&self, symbol: &str) -> Option<String> {
        let guard = self.symbols.lock().await;
        guard.get(symbol).map(|st| st.state.as_str().to_string())
    }

    // ---- internals ----

    async fn rebuild_pools(
        &self,
        symbol: &str,
        st: &mut SymbolState,
        m15: &[Bar],
        now: DateTime<Utc>,
        now_ms: i64,
    ) {
        let (swing_highs, swing_lows) = find_swings(m15);
        let previous_day = previous_day_levels(m15, now);
        let rebuilt = self.liquidity_engine.build_pools(
            st.session.previous(),
            previous_day.as_ref(),
            &swing_highs,
            &swing_lows,
            &st.pools,
            now_ms,
        );

        let changed = rebuilt.len() != st.pools.len()
            || rebuilt.iter().any(|p| {
                !st.pools
                    .iter()
                    .any(|q| q.pool_key == p.pool_key && q.swept == p.swept)
            });
        if changed {
            let swept_count = rebuilt.iter().filter(|p| p.swept).count();
            let session_name = st
                .session
                .current()
                .map(|s| s.session_type.as_str().to_string())
                .unwrap_or_else(|| "OFF_SESSION".to_string());
            self.logger
                .log(&LogEvent::SmcPoolsBuilt {
                    symbol: symbol.to_string(),
                    session: session_name,
                    pool_count: rebuilt.len(),
                    swept_count,
                })
                .await;
        }
        st.pools = rebuilt;
    }

    /// Next FSM event derivable from closed evidence, or None
    fn next_event(
        &self,
        st: &mut SymbolState,
        context: &Option<ContextDecision>,
        sweep_events: &mut Vec<SweepEvent>,
        m15: &[Bar],
        m5: &[Bar],
        symbol: &str,
    ) -> Option<InstEvent> {
        match st.state {
            InstState::Idle => {
                let ctx = context.as_ref()?;
                if !ctx.can_trade || ctx.grade == SessionGrade::NoTrade {
                    return None;
                }
                if st.trades_this_session >= self.config.max_trades_per_session {
                    return None;
                }
                st.session.previous()?;
                Some(InstEvent::ContextReady)
            }
            InstState::WaitSweep => {
                if sweep_events.is_empty() {
                    return None;
                }
                let sweep = sweep_events.remove(0);
                let direction = sweep.direction;
                st.active_sweep = Some(sweep);
                Some(InstEvent::SweepConfirmed { direction })
            }
            InstState::WaitChoch => {
                let sweep = st.active_sweep.as_ref()?;
                let choch = detect_choch(
                    symbol,
                    m15,
                    sweep.direction,
                    self.config.choch_min_pips,
                    sweep.candle_ms,
                )?;
                let direction = choch.direction;
                st.active_choch = Some(choch);
                Some(InstEvent::ChochConfirmed { direction })
            }
            InstState::WaitFvg => {
                let sweep = st.active_sweep.as_ref()?;
                let choch = st.active_choch.as_ref()?;
                let mut zone = self
                    .fvg_engine
                    .detect(symbol, m5, sweep.direction, choch.timestamp_ms)?;
                // Bars that closed after the gap formed in this same
                // cycle still count toward mitigation/invalidation
                let created_at_ms = zone.created_at_ms;
                for bar in m5.iter().filter(|b| b.timestamp_ms > created_at_ms) {
                    update_zone(&mut zone, bar);
                }
                st.active_fvg = Some(zone);
                Some(InstEvent::FvgFormed)
            }
            InstState::WaitMitigation => {
                let zone = st.active_fvg.as_ref()?;
                if zone.invalidated {
                    Some(InstEvent::FvgInvalidated)
                } else if zone.mitigated {
                    Some(InstEvent::FvgMitigated)
                } else {
                    None
                }
            }
            // Entry is consumed externally; cooldown only times out
            InstState::WaitEntry | InstState::Cooldown => None,
        }
    }

    async fn apply_event(
        &self,
        symbol: &str,
        st: &mut SymbolState,
        event: InstEvent,
        now_ms: i64,
    ) {
        let (next, outcome) = transition(st.state, &event);
        if next != st.state {
            let record = TransitionRecord {
                from: st.state.as_str().to_string(),
                to: next.as_str().to_string(),
                trigger: event.as_str().to_string(),
                at_ms: now_ms,
            };
            debug!(
                "{} FSM {} -> {} ({})",
                symbol, record.from, record.to, record.trigger
            );
            self.logger
                .log(&LogEvent::SmcFsmTransition {
                    symbol: symbol.to_string(),
                    from: record.from.clone(),
                    to: record.to.clone(),
                    trigger: record.trigger.clone(),
                })
                .await;
            st.transitions.push(record);
            st.state = next;
            st.state_changed_at_ms = now_ms;
        }

        if let Some(outcome) = outcome {
            let (decision, reason) = match outcome {
                Outcome::NoTrade { reason } => ("NO_TRADE", reason),
                Outcome::Expire => ("EXPIRE", "state timeout exceeded"),
            };
            self.logger
                .log(&LogEvent::SmcDecision {
                    symbol: symbol.to_string(),
                    decision: decision.to_string(),
                    direction: st
                        .active_sweep
                        .as_ref()
                        .map(|s| s.direction.trade_direction().as_str().to_string()),
                    reason: reason.to_string(),
                    pool_key: st.active_sweep.as_ref().map(|s| s.pool_key.clone()),
                    fvg_id: st.active_fvg.as_ref().map(|z| z.id.clone()),
                    choch_price: st.active_choch.as_ref().map(|c| c.price),
                })
                .await;
        }

        if st.state == InstState::Idle {
            st.active_sweep = None;
            st.active_choch = None;
            st.active_fvg = None;
        }
    }

    async fn emit_status(&self, symbol: &str, st: &SymbolState, source: &str) {
        let session_name = st
            .session
            .current()
            .map(|s| s.session_type.as_str().to_string())
            .unwrap_or_else(|| "OFF_SESSION".to_string());
        self.logger
            .log(&LogEvent::SmcStatus {
                symbol: symbol.to_string(),
                enabled: true,
                source: source.to_string(),
                session: session_name,
                fsm_phase: st.state.as_str().to_string(),
                trades_this_session: st.trades_this_session,
                max_trades_per_session: self.config.max_trades_per_session,
            })
            .await;
    }

    fn signal_for(
        &self,
        symbol: &str,
        st: &SymbolState,
        context: &Option<ContextDecision>,
    ) -> StrategySignal {
        if st.state != InstState::WaitEntry {
            return StrategySignal::flat(format!("fsm in {}", st.state.as_str()));
        }
        let Some(sweep) = st.active_sweep.as_ref() else {
            return StrategySignal::flat("armed without sweep context");
        };
        let Some(ctx) = context.as_ref() else {
            return StrategySignal::flat("no session context");
        };

        let direction = sweep.direction.trade_direction();
        if !ctx.allowed_directions.contains(&direction) {
            return StrategySignal::flat("direction blocked by context bias");
        }

        let base = match ctx.grade {
            SessionGrade::GradeA => 85.0,
            SessionGrade::GradeB => 75.0,
            SessionGrade::GradeC => 65.0,
            SessionGrade::NoTrade => return StrategySignal::flat("context degraded"),
        };
        let gap_bonus = st
            .active_fvg
            .as_ref()
            .map(|z| z.gap_size_pips.min(5.0) * 2.0)
            .unwrap_or(0.0);
        let confidence = (base + gap_bonus).min(95.0);

        let reason = format!(
            "{} sweep @ {:.5} + choch + fvg mitigated",
            sweep.pool_type.as_str(),
            sweep.price
        );

        StrategySignal {
            direction: Some(direction),
            confidence,
            reason: format!("SMC: {} ({})", reason, symbol),
            stop_loss_pips: Some(self.config.stop_loss_pips),
            take_profit_pips: Some(self.config.stop_loss_pips * self.config.risk_reward),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LogMirror;
    use crate::types::TradeDirection;
    use chrono::TimeZone;

    fn config() -> SmcConfig {
        SmcConfig {
            choch_min_pips: 5.0,
            min_gap_pips: 2.0,
            max_swing_pools: 3,
            max_trades_per_session: 2,
            min_session_range_pips: 15.0,
            stop_loss_pips: 12.0,
            risk_reward: 2.0,
            wait_sweep_timeout_min: 90,
            wait_choch_timeout_min: 60,
            wait_fvg_timeout_min: 60,
            wait_mitigation_timeout_min: 90,
            wait_entry_timeout_min: 30,
            cooldown_min: 20,
        }
    }

    fn strategy() -> (SmcStrategy, Arc<LogMirror>) {
        let mirror = Arc::new(LogMirror::in_memory());
        let logger = Arc::new(DecisionLogger::new(Arc::clone(&mirror)));
        (SmcStrategy::new(config(), logger), mirror)
    }

    fn bar(ts: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp_ms: ts,
            open,
            high,
            low,
            close,
            volume: 100,
        }
    }

    fn ms(h: u32, mi: u32) -> i64 {
        chrono::Utc
            .with_ymd_and_hms(2025, 6, 10, h, mi, 0)
            .unwrap()
            .timestamp_millis()
    }

    /// London session 07:00-12:00 with a ~44-pip range, then NY bars:
    /// a sweep of the London high, a bearish CHoCH, and room for an M5
    /// bearish FVG afterwards.
    fn scenario_m15() -> Vec<Bar> {
        let mut bars = Vec::new();
        // London: low 1.0996, high capped at 1.1040
        let mut t = ms(7, 0);
        let mut price: f64 = 1.1000;
        while t < ms(12, 0) {
            let high = (price + 0.0008).min(1.1040);
            bars.push(bar(t, price, high, price - 0.0004, price + 0.0004));
            price = (price + 0.0004).min(1.1036);
            t += 900_000;
        }
        // NY open drifts under the London high, leaving a swing low at
        // 1.1015
        bars.push(bar(ms(12, 0), 1.1030, 1.1036, 1.1020, 1.1028));
        bars.push(bar(ms(12, 15), 1.1028, 1.1032, 1.1015, 1.1022));
        bars.push(bar(ms(12, 30), 1.1022, 1.1030, 1.1018, 1.1026));
        // Sweep: wick above 1.1040, close back below
        bars.push(bar(ms(12, 45), 1.1026, 1.1048, 1.1024, 1.1032));
        // CHoCH: close more than 5 pips under the 1.1015 swing low
        bars.push(bar(ms(13, 0), 1.1032, 1.1033, 1.1002, 1.1006));
        bars
    }

    /// M5 bars after the CHoCH (13:00): bearish three-candle gap, then
    /// optionally a retrace into the gap.
    fn scenario_m5(include_mitigation: bool) -> Vec<Bar> {
        let mut bars = vec![
            // c1 low 1.1006
            bar(ms(13, 5), 1.1008, 1.1012, 1.1006, 1.1007),
            // c2 drives down
            bar(ms(13, 10), 1.1007, 1.1007, 1.0992, 1.0994),
            // c3 high 1.0998 < c1 low 1.1006: 8-pip gap
            bar(ms(13, 15), 1.0994, 1.0998, 1.0986, 1.0990),
        ];
        if include_mitigation {
            // Retrace wicks into the gap zone [1.0998, 1.1006]
            bars.push(bar(ms(13, 20), 1.0990, 1.1002, 1.0988, 1.0996));
        }
        bars
    }

    fn bundle(m15: Vec<Bar>, m5: Vec<Bar>, bid: f64, ask: f64) -> MtfBundle {
        MtfBundle {
            symbol: "EURUSD".to_string(),
            h1: Vec::new(),
            m15,
            m5,
            bid,
            ask,
            spread_pips: 2.0,
        }
    }

    #[tokio::test]
    async fn test_full_setup_produces_sell_signal() {
        let (strategy, _mirror) = strategy();
        let now = chrono::Utc.with_ymd_and_hms(2025, 6, 10, 13, 30, 0).unwrap();

        let signal = strategy
            .analyze(&bundle(scenario_m15(), scenario_m5(true), 1.0995, 1.0997), now)
            .await;
        assert_eq!(signal.direction, Some(TradeDirection::Sell));
        assert!(signal.confidence >= 50.0);
        assert_eq!(
            strategy.fsm_phase("EURUSD").await.as_deref(),
            Some("WAIT_ENTRY")
        );
    }

    #[tokio::test]
    async fn test_stops_at_mitigation_without_retrace() {
        let (strategy, _mirror) = strategy();
        let now = chrono::Utc.with_ymd_and_hms(2025, 6, 10, 13, 30, 0).unwrap();

        let signal = strategy
            .analyze(&bundle(scenario_m15(), scenario_m5(false), 1.0990, 1.0992), now)
            .await;
        assert!(signal.direction.is_none());
        assert_eq!(
            strategy.fsm_phase("EURUSD").await.as_deref(),
            Some("WAIT_MITIGATION")
        );
    }

    #[tokio::test]
    async fn test_mitigation_in_later_cycle() {
        let (strategy, _mirror) = strategy();
        let now1 = chrono::Utc.with_ymd_and_hms(2025, 6, 10, 13, 20, 0).unwrap();
        let _ = strategy
            .analyze(&bundle(scenario_m15(), scenario_m5(false), 1.0990, 1.0992), now1)
            .await;
        assert_eq!(
            strategy.fsm_phase("EURUSD").await.as_deref(),
            Some("WAIT_MITIGATION")
        );

        // The retrace bar closes in a later cycle
        let now2 = chrono::Utc.with_ymd_and_hms(2025, 6, 10, 13, 30, 0).unwrap();
        let signal = strategy
            .analyze(&bundle(scenario_m15(), scenario_m5(true), 1.0995, 1.0997), now2)
            .await;
        assert_eq!(signal.direction, Some(TradeDirection::Sell));
        assert_eq!(
            strategy.fsm_phase("EURUSD").await.as_deref(),
            Some("WAIT_ENTRY")
        );
    }

    #[tokio::test]
    async fn test_trade_execution_moves_to_cooldown() {
        let (strategy, mirror) = strategy();
        let now = chrono::Utc.with_ymd_and_hms(2025, 6, 10, 13, 30, 0).unwrap();

        let signal = strategy
            .analyze(&bundle(scenario_m15(), scenario_m5(true), 1.0995, 1.0997), now)
            .await;
        assert!(signal.is_actionable());

        strategy
            .notify_trade_executed("EURUSD", now.timestamp_millis())
            .await;
        assert_eq!(
            strategy.fsm_phase("EURUSD").await.as_deref(),
            Some("COOLDOWN")
        );

        let entries = mirror.entries().await;
        let trade_decision = entries
            .iter()
            .find(|e| e["type"] == "SMC_INST_DECISION" && e["decision"] == "TRADE")
            .expect("TRADE decision logged");
        assert_eq!(trade_decision["direction"], "SELL");
    }

    #[tokio::test]
    async fn test_no_lookahead_ignores_unclosed_bars() {
        let (strategy, _mirror) = strategy();
        // Clock sits one minute after the sweep bar OPENED: that bar is
        // not closed yet and must not arm anything
        let now = chrono::Utc.with_ymd_and_hms(2025, 6, 10, 12, 46, 0).unwrap();

        let _ = strategy
            .analyze(&bundle(scenario_m15(), Vec::new(), 1.1030, 1.1032), now)
            .await;
        let phase = strategy.fsm_phase("EURUSD").await.unwrap();
        assert!(phase == "WAIT_SWEEP" || phase == "IDLE");
    }

    #[tokio::test]
    async fn test_boot_emits_status() {
        let (strategy, mirror) = strategy();
        let now = chrono::Utc.with_ymd_and_hms(2025, 6, 10, 13, 30, 0).unwrap();
        let _ = strategy
            .analyze(&bundle(scenario_m15(), Vec::new(), 1.1, 1.1002), now)
            .await;

        let entries = mirror.entries().await;
        let status = entries
            .iter()
            .find(|e| e["type"] == "SMC_INST_STATUS")
            .expect("status logged");
        assert_eq!(status["source"], "boot");
        assert_eq!(status["max_trades_per_session"], 2);
    }

    #[tokio::test]
    async fn test_fsm_transitions_are_logged() {
        let (strategy, mirror) = strategy();
        let now = chrono::Utc.with_ymd_and_hms(2025, 6, 10, 13, 30, 0).unwrap();
        let _ = strategy
            .analyze(&bundle(scenario_m15(), scenario_m5(true), 1.0995, 1.0997), now)
            .await;

        let entries = mirror.entries().await;
        let transitions: Vec<String> = entries
            .iter()
            .filter(|e| e["type"] == "SMC_INST_FSM_TRANSITION")
            .map(|e| format!("{}->{}", e["from"].as_str().unwrap(), e["to"].as_str().unwrap()))
            .collect();
        assert_eq!(
            transitions,
            vec![
                "IDLE->WAIT_SWEEP",
                "WAIT_SWEEP->WAIT_CHOCH",
                "WAIT_CHOCH->WAIT_FVG",
                "WAIT_FVG->WAIT_MITIGATION",
                "WAIT_MITIGATION->WAIT_ENTRY",
            ]
        );
    }
}
