/// Liquidity engine: builds prioritized pools from session, daily and
/// swing levels, preserving sweep state across rebuilds via stable keys
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::smc::session::{DayLevels, SessionSnapshot};
use crate::smc::structure::SwingPoint;
use crate::smc::ZoneDirection;
use crate::types::Bar;

/// Pools older than this are dropped regardless of sweep state
const POOL_TTL_MS: i64 = 24 * 3600 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PoolType {
    SessionHigh,
    SessionLow,
    DailyHigh,
    DailyLow,
    SwingHigh,
    SwingLow,
}

impl PoolType {
    pub fn as_str(&self) -> &str {
        match self {
            PoolType::SessionHigh => "SESSION_HIGH",
            PoolType::SessionLow => "SESSION_LOW",
            PoolType::DailyHigh => "DAILY_HIGH",
            PoolType::DailyLow => "DAILY_LOW",
            PoolType::SwingHigh => "SWING_HIGH",
            PoolType::SwingLow => "SWING_LOW",
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(
            self,
            PoolType::SessionHigh | PoolType::DailyHigh | PoolType::SwingHigh
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LiquidityPool {
    pub pool_key: String,
    pub pool_type: PoolType,
    pub price: f64,
    /// Anchor timestamp the key is derived from; also the TTL origin
    pub timestamp_ms: i64,
    pub source: String,
    pub priority: u8,
    pub swept: bool,
    pub swept_at_ms: Option<i64>,
    pub swept_candle_ms: Option<i64>,
    pub sweep_direction: Option<ZoneDirection>,
}

/// Deterministic pool identity: stable across rebuilds for the same
/// (type, price to 5dp, anchor), independent of build order
pub fn pool_key(pool_type: PoolType, price: f64, anchor_ms: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pool_type.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(format!("{:.5}", price).as_bytes());
    hasher.update(b"|");
    hasher.update(anchor_ms.to_string().as_bytes());
    let digest = hasher.finalize();
    format!("{:x}", digest)[..16].to_string()
}

#[derive(Debug, Clone)]
pub struct SweepEvent {
    pub pool_key: String,
    pub pool_type: PoolType,
    pub price: f64,
    pub direction: ZoneDirection,
    pub candle_ms: i64,
    pub priority: u8,
}

pub struct LiquidityEngine {
    max_swing_pools: usize,
}

impl LiquidityEngine {
    pub fn new(max_swing_pools: usize) -> Self {
        LiquidityEngine { max_swing_pools }
    }

    /// Rebuild the pool set. A pool whose key matches a previously swept
    /// pool inherits the sweep state: rebuilds must never forget sweeps.
    pub fn build_pools(
        &self,
        previous_session: Option<&SessionSnapshot>,
        previous_day: Option<&DayLevels>,
        swing_highs: &[SwingPoint],
        swing_lows: &[SwingPoint],
        existing: &[LiquidityPool],
        now_ms: i64,
    ) -> Vec<LiquidityPool> {
        let mut pools: Vec<LiquidityPool> = Vec::new();

        if let Some(session) = previous_session {
            let anchor = session.end_time_ms;
            pools.push(self.candidate(
                PoolType::SessionHigh,
                session.high,
                anchor,
                format!("{}_high", session.session_type.as_str().to_lowercase()),
                1,
            ));
            pools.push(self.candidate(
                PoolType::SessionLow,
                session.low,
                anchor,
                format!("{}_low", session.session_type.as_str().to_lowercase()),
                1,
            ));
        }

        if let Some(day) = previous_day {
            pools.push(self.candidate(
                PoolType::DailyHigh,
                day.high,
                day.anchor_ms,
                "previous_day_high".to_string(),
                2,
            ));
            pools.push(self.candidate(
                PoolType::DailyLow,
                day.low,
                day.anchor_ms,
                "previous_day_low".to_string(),
                2,
            ));
        }

        for swing in swing_highs.iter().rev().take(self.max_swing_pools) {
            pools.push(self.candidate(
                PoolType::SwingHigh,
                swing.price,
                swing.timestamp_ms,
                "swing_high".to_string(),
                3,
            ));
        }
        for swing in swing_lows.iter().rev().take(self.max_swing_pools) {
            pools.push(self.candidate(
                PoolType::SwingLow,
                swing.price,
                swing.timestamp_ms,
                "swing_low".to_string(),
                3,
            ));
        }

        // Inherit sweep state by key, then expire old pools
        for pool in &mut pools {
            if let Some(prior) = existing.iter().find(|p| p.pool_key == pool.pool_key) {
                if prior.swept {
                    pool.swept = true;
                    pool.swept_at_ms = prior.swept_at_ms;
                    pool.swept_candle_ms = prior.swept_candle_ms;
                    pool.sweep_direction = prior.sweep_direction;
                }
            }
        }
        pools.retain(|p| now_ms - p.timestamp_ms <= POOL_TTL_MS);

        debug!(
            "Built {} pools ({} swept)",
            pools.len(),
            pools.iter().filter(|p| p.swept).count()
        );
        pools
    }

    fn candidate(
        &self,
        pool_type: PoolType,
        price: f64,
        anchor_ms: i64,
        source: String,
        priority: u8,
    ) -> LiquidityPool {
        LiquidityPool {
            pool_key: pool_key(pool_type, price, anchor_ms),
            pool_type,
            price,
            timestamp_ms: anchor_ms,
            source,
            priority,
            swept: false,
            swept_at_ms: None,
            swept_candle_ms: None,
            sweep_direction: None,
        }
    }
}

/// Confirmed-sweep detection on one closed M15 bar. A HIGH pool is
/// swept iff the bar wicks above it and closes back below; symmetric
/// for LOW pools. Intra-bar wicks never reach this code path.
pub fn detect_sweeps(pools: &mut [LiquidityPool], closed_m15: &Bar, now_ms: i64) -> Vec<SweepEvent> {
    let mut events = Vec::new();

    for pool in pools.iter_mut() {
        if pool.swept {
            continue;
        }
        let swept = if pool.pool_type.is_high() {
            closed_m15.high > pool.price && closed_m15.close < pool.price
        } else {
            closed_m15.low < pool.price && closed_m15.close > pool.price
        };
        if !swept {
            continue;
        }

        let direction = if pool.pool_type.is_high() {
            ZoneDirection::Bearish
        } else {
            ZoneDirection::Bullish
        };
        pool.swept = true;
        pool.swept_at_ms = Some(now_ms);
        pool.swept_candle_ms = Some(closed_m15.timestamp_ms);
        pool.sweep_direction = Some(direction);

        events.push(SweepEvent {
            pool_key: pool.pool_key.clone(),
            pool_type: pool.pool_type,
            price: pool.price,
            direction,
            candle_ms: closed_m15.timestamp_ms,
            priority: pool.priority,
        });
    }

    // Highest-priority sweep first (priority 1 beats 3)
    events.sort_by_key(|e| e.priority);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smc::session::SessionType;

    fn session(high: f64, low: f64, end_ms: i64) -> SessionSnapshot {
        SessionSnapshot {
            session_type: SessionType::London,
            high,
            low,
            open: low,
            close: high,
            start_time_ms: end_ms - 5 * 3600 * 1000,
            end_time_ms: end_ms,
            is_complete: true,
            candle_count: 20,
        }
    }

    fn bar(ts: i64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp_ms: ts,
            open: close,
            high,
            low,
            close,
            volume: 100,
        }
    }

    #[test]
    fn test_pool_key_is_deterministic() {
        let a = pool_key(PoolType::SessionHigh, 1.10502, 1000);
        let b = pool_key(PoolType::SessionHigh, 1.10502, 1000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        // Any component change changes the key
        assert_ne!(a, pool_key(PoolType::SessionLow, 1.10502, 1000));
        assert_ne!(a, pool_key(PoolType::SessionHigh, 1.10503, 1000));
        assert_ne!(a, pool_key(PoolType::SessionHigh, 1.10502, 2000));
    }

    #[test]
    fn test_build_pools_priorities() {
        let engine = LiquidityEngine::new(2);
        let sess = session(1.11, 1.10, 1_000_000);
        let day = DayLevels {
            high: 1.12,
            low: 1.09,
            anchor_ms: 900_000,
        };
        let highs = vec![
            SwingPoint { price: 1.105, timestamp_ms: 100_000, is_high: true },
            SwingPoint { price: 1.106, timestamp_ms: 200_000, is_high: true },
            SwingPoint { price: 1.107, timestamp_ms: 300_000, is_high: true },
        ];
        let pools = engine.build_pools(Some(&sess), Some(&day), &highs, &[], &[], 1_000_000);

        // 2 session + 2 daily + capped 2 swing highs
        assert_eq!(pools.len(), 6);
        assert_eq!(pools.iter().filter(|p| p.priority == 1).count(), 2);
        assert_eq!(pools.iter().filter(|p| p.priority == 2).count(), 2);
        assert_eq!(pools.iter().filter(|p| p.priority == 3).count(), 2);
        // The cap keeps the most recent swings
        assert!(pools.iter().any(|p| p.price == 1.107));
        assert!(pools.iter().any(|p| p.price == 1.106));
        assert!(!pools.iter().any(|p| p.price == 1.105));
    }

    #[test]
    fn test_rebuild_inherits_swept_state() {
        let engine = LiquidityEngine::new(3);
        let sess = session(1.11, 1.10, 1_000_000);

        let mut pools = engine.build_pools(Some(&sess), None, &[], &[], &[], 1_000_000);
        // Sweep the session high
        let events = detect_sweeps(&mut pools, &bar(2_000_000, 1.1110, 1.1050, 1.1080), 2_000_000);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].pool_type, PoolType::SessionHigh);
        assert_eq!(events[0].direction, ZoneDirection::Bearish);

        // Rebuild from the same inputs, in a different call: the swept
        // bit must survive
        let rebuilt = engine.build_pools(Some(&sess), None, &[], &[], &pools, 2_500_000);
        let high_pool = rebuilt
            .iter()
            .find(|p| p.pool_type == PoolType::SessionHigh)
            .unwrap();
        assert!(high_pool.swept);
        assert_eq!(high_pool.swept_candle_ms, Some(2_000_000));
        assert_eq!(high_pool.sweep_direction, Some(ZoneDirection::Bearish));

        let low_pool = rebuilt
            .iter()
            .find(|p| p.pool_type == PoolType::SessionLow)
            .unwrap();
        assert!(!low_pool.swept);
    }

    #[test]
    fn test_sweep_requires_close_back_inside() {
        let engine = LiquidityEngine::new(3);
        let sess = session(1.11, 1.10, 1_000_000);
        let mut pools = engine.build_pools(Some(&sess), None, &[], &[], &[], 1_000_000);

        // Wick above but close above too: a breakout, not a sweep
        let events = detect_sweeps(&mut pools, &bar(2_000_000, 1.1150, 1.1080, 1.1120), 2_000_000);
        assert!(events.is_empty());
        assert!(pools.iter().all(|p| !p.swept));

        // Low pool: wick below, close back above
        let events = detect_sweeps(&mut pools, &bar(3_000_000, 1.1080, 1.0990, 1.1020), 3_000_000);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].pool_type, PoolType::SessionLow);
        assert_eq!(events[0].direction, ZoneDirection::Bullish);
    }

    #[test]
    fn test_pools_expire_after_24h() {
        let engine = LiquidityEngine::new(3);
        let sess = session(1.11, 1.10, 1_000_000);
        let now = 1_000_000 + POOL_TTL_MS + 1;
        let pools = engine.build_pools(Some(&sess), None, &[], &[], &[], now);
        assert!(pools.is_empty());
    }

    #[test]
    fn test_sweep_events_ordered_by_priority() {
        let engine = LiquidityEngine::new(3);
        let sess = session(1.11, 1.10, 1_000_000);
        let highs = vec![SwingPoint { price: 1.1090, timestamp_ms: 500_000, is_high: true }];
        let mut pools = engine.build_pools(Some(&sess), None, &highs, &[], &[], 1_000_000);

        // One bar sweeps both the swing high (1.1090) and session high (1.11)
        let events = detect_sweeps(&mut pools, &bar(2_000_000, 1.1120, 1.1000, 1.1050), 2_000_000);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].pool_type, PoolType::SessionHigh);
        assert_eq!(events[1].pool_type, PoolType::SwingHigh);
    }
}
