/// Fair Value Gap engine: three-candle imbalances on M5 with
/// mitigation and invalidation tracking
use serde::Serialize;
use tracing::debug;

use crate::smc::ZoneDirection;
use crate::types::Bar;
use crate::utils::pip::pip_size;

#[derive(Debug, Clone, Serialize)]
pub struct FvgZone {
    pub id: String,
    pub direction: ZoneDirection,
    /// Upper boundary of the gap
    pub high: f64,
    /// Lower boundary of the gap
    pub low: f64,
    pub gap_size_pips: f64,
    pub created_at_ms: i64,
    pub mitigated: bool,
    pub mitigated_at_ms: Option<i64>,
    pub mitigated_price: Option<f64>,
    pub invalidated: bool,
}

impl FvgZone {
    pub fn is_valid(&self) -> bool {
        !self.invalidated
    }
}

pub struct FvgEngine {
    min_gap_pips: f64,
}

impl FvgEngine {
    pub fn new(min_gap_pips: f64) -> Self {
        FvgEngine { min_gap_pips }
    }

    /// Most recent three-candle imbalance in the expected direction
    /// whose middle candle closed after `after_ms`.
    ///
    /// Bearish: candle1.low > candle3.high leaves a gap the price fell
    /// through; bullish is symmetric.
    pub fn detect(
        &self,
        symbol: &str,
        closed_m5: &[Bar],
        direction: ZoneDirection,
        after_ms: i64,
    ) -> Option<FvgZone> {
        if closed_m5.len() < 3 {
            return None;
        }
        let pip = pip_size(symbol);

        for i in (2..closed_m5.len()).rev() {
            let c1 = &closed_m5[i - 2];
            let c2 = &closed_m5[i - 1];
            let c3 = &closed_m5[i];
            if c2.timestamp_ms <= after_ms {
                break;
            }

            let (low, high) = match direction {
                ZoneDirection::Bearish if c3.high < c1.low => (c3.high, c1.low),
                ZoneDirection::Bullish if c3.low > c1.high => (c1.high, c3.low),
                _ => continue,
            };

            let gap_size_pips = (high - low) / pip;
            if gap_size_pips < self.min_gap_pips {
                continue;
            }

            let zone = FvgZone {
                id: format!("fvg_{}_{}", c2.timestamp_ms, direction.as_str().to_lowercase()),
                direction,
                high,
                low,
                gap_size_pips,
                created_at_ms: c3.timestamp_ms,
                mitigated: false,
                mitigated_at_ms: None,
                mitigated_price: None,
                invalidated: false,
            };
            debug!(
                "FVG detected {}: [{:.5}, {:.5}] {:.1} pips",
                zone.id, zone.low, zone.high, zone.gap_size_pips
            );
            return Some(zone);
        }
        None
    }
}

/// Advance zone state with one closed M5 bar. Mitigation means price
/// re-entered the gap; invalidation means it passed fully through the
/// opposite boundary.
pub fn update_zone(zone: &mut FvgZone, closed_m5: &Bar) {
    if zone.invalidated || closed_m5.timestamp_ms < zone.created_at_ms {
        return;
    }

    match zone.direction {
        ZoneDirection::Bearish => {
            if closed_m5.close > zone.high {
                zone.invalidated = true;
                return;
            }
            if !zone.mitigated && closed_m5.high >= zone.low {
                zone.mitigated = true;
                zone.mitigated_at_ms = Some(closed_m5.timestamp_ms);
                zone.mitigated_price = Some(closed_m5.high.min(zone.high));
            }
        }
        ZoneDirection::Bullish => {
            if closed_m5.close < zone.low {
                zone.invalidated = true;
                return;
            }
            if !zone.mitigated && closed_m5.low <= zone.high {
                zone.mitigated = true;
                zone.mitigated_at_ms = Some(closed_m5.timestamp_ms);
                zone.mitigated_price = Some(closed_m5.low.max(zone.low));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp_ms: ts,
            open,
            high,
            low,
            close,
            volume: 50,
        }
    }

    /// c1 low 1.1040, c3 high 1.1030: bearish gap [1.1030, 1.1040]
    fn bearish_gap_bars() -> Vec<Bar> {
        vec![
            bar(0, 1.1050, 1.1060, 1.1040, 1.1045),
            bar(300_000, 1.1045, 1.1046, 1.1028, 1.1030),
            bar(600_000, 1.1029, 1.1030, 1.1015, 1.1018),
        ]
    }

    #[test]
    fn test_detect_bearish_gap() {
        let engine = FvgEngine::new(2.0);
        let zone = engine
            .detect("EURUSD", &bearish_gap_bars(), ZoneDirection::Bearish, 0)
            .unwrap();
        assert_eq!(zone.direction, ZoneDirection::Bearish);
        assert!((zone.low - 1.1030).abs() < 1e-9);
        assert!((zone.high - 1.1040).abs() < 1e-9);
        assert!((zone.gap_size_pips - 10.0).abs() < 1e-6);
        assert!(!zone.mitigated);
    }

    #[test]
    fn test_gap_below_minimum_ignored() {
        let engine = FvgEngine::new(15.0);
        assert!(engine
            .detect("EURUSD", &bearish_gap_bars(), ZoneDirection::Bearish, 0)
            .is_none());
    }

    #[test]
    fn test_detect_respects_direction_and_gate() {
        let engine = FvgEngine::new(2.0);
        // Wrong direction
        assert!(engine
            .detect("EURUSD", &bearish_gap_bars(), ZoneDirection::Bullish, 0)
            .is_none());
        // Middle candle at/before the gate
        assert!(engine
            .detect("EURUSD", &bearish_gap_bars(), ZoneDirection::Bearish, 300_000)
            .is_none());
    }

    #[test]
    fn test_mitigation_then_invalidation() {
        let engine = FvgEngine::new(2.0);
        let mut zone = engine
            .detect("EURUSD", &bearish_gap_bars(), ZoneDirection::Bearish, 0)
            .unwrap();

        // Price below the gap: nothing happens
        update_zone(&mut zone, &bar(900_000, 1.1018, 1.1025, 1.1010, 1.1015));
        assert!(!zone.mitigated && !zone.invalidated);

        // Wick back into the gap: mitigated
        update_zone(&mut zone, &bar(1_200_000, 1.1015, 1.1034, 1.1012, 1.1020));
        assert!(zone.mitigated);
        assert_eq!(zone.mitigated_at_ms, Some(1_200_000));
        assert!((zone.mitigated_price.unwrap() - 1.1034).abs() < 1e-9);
        assert!(zone.is_valid());

        // Close above the upper boundary: invalidated
        update_zone(&mut zone, &bar(1_500_000, 1.1020, 1.1050, 1.1018, 1.1045));
        assert!(zone.invalidated);
        assert!(!zone.is_valid());
    }

    #[test]
    fn test_bullish_gap_lifecycle() {
        let engine = FvgEngine::new(2.0);
        // c1 high 1.1010, c3 low 1.1025: bullish gap [1.1010, 1.1025]
        let bars = vec![
            bar(0, 1.1000, 1.1010, 1.0990, 1.1005),
            bar(300_000, 1.1005, 1.1028, 1.1004, 1.1026),
            bar(600_000, 1.1026, 1.1040, 1.1025, 1.1035),
        ];
        let mut zone = engine
            .detect("EURUSD", &bars, ZoneDirection::Bullish, 0)
            .unwrap();
        assert!((zone.low - 1.1010).abs() < 1e-9);
        assert!((zone.high - 1.1025).abs() < 1e-9);

        // Dip into the gap: mitigated
        update_zone(&mut zone, &bar(900_000, 1.1035, 1.1036, 1.1020, 1.1030));
        assert!(zone.mitigated);

        // Close below the lower boundary: invalidated
        update_zone(&mut zone, &bar(1_200_000, 1.1030, 1.1031, 1.1000, 1.1005));
        assert!(zone.invalidated);
    }
}
