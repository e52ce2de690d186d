/// Market structure: fractal swing points and change-of-character
/// detection on closed bars
use crate::smc::ZoneDirection;
use crate::types::Bar;
use crate::utils::pip::pip_size;

/// Bars on each side that must be strictly exceeded for a fractal swing
const SWING_STRENGTH: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct SwingPoint {
    pub price: f64,
    pub timestamp_ms: i64,
    pub is_high: bool,
}

/// Fractal swing highs and lows, oldest first
pub fn find_swings(bars: &[Bar]) -> (Vec<SwingPoint>, Vec<SwingPoint>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    if bars.len() < SWING_STRENGTH * 2 + 1 {
        return (highs, lows);
    }

    for i in SWING_STRENGTH..bars.len() - SWING_STRENGTH {
        let candidate = &bars[i];
        let neighbors = bars[i - SWING_STRENGTH..i]
            .iter()
            .chain(bars[i + 1..=i + SWING_STRENGTH].iter());

        let mut is_high = true;
        let mut is_low = true;
        for neighbor in neighbors {
            if neighbor.high >= candidate.high {
                is_high = false;
            }
            if neighbor.low <= candidate.low {
                is_low = false;
            }
        }

        if is_high {
            highs.push(SwingPoint {
                price: candidate.high,
                timestamp_ms: candidate.timestamp_ms,
                is_high: true,
            });
        }
        if is_low {
            lows.push(SwingPoint {
                price: candidate.low,
                timestamp_ms: candidate.timestamp_ms,
                is_high: false,
            });
        }
    }
    (highs, lows)
}

#[derive(Debug, Clone, Copy)]
pub struct ChochSignal {
    pub direction: ZoneDirection,
    /// Close that broke structure
    pub price: f64,
    /// The swing level that was broken
    pub broken_level: f64,
    pub timestamp_ms: i64,
}

/// Change of character in the expected direction: the last closed bar
/// breaks the most recent opposing swing by at least `min_pips`.
/// A HIGH sweep expects a bearish CHoCH, a LOW sweep a bullish one.
pub fn detect_choch(
    symbol: &str,
    bars: &[Bar],
    expected: ZoneDirection,
    min_pips: f64,
    after_ms: i64,
) -> Option<ChochSignal> {
    let last = bars.last()?;
    if last.timestamp_ms <= after_ms {
        return None;
    }

    let (highs, lows) = find_swings(bars);
    let pip = pip_size(symbol);
    let threshold = min_pips * pip;

    match expected {
        ZoneDirection::Bearish => {
            let swing_low = lows
                .iter()
                .rev()
                .find(|s| s.timestamp_ms < last.timestamp_ms)?;
            if last.close <= swing_low.price - threshold {
                return Some(ChochSignal {
                    direction: ZoneDirection::Bearish,
                    price: last.close,
                    broken_level: swing_low.price,
                    timestamp_ms: last.timestamp_ms,
                });
            }
            None
        }
        ZoneDirection::Bullish => {
            let swing_high = highs
                .iter()
                .rev()
                .find(|s| s.timestamp_ms < last.timestamp_ms)?;
            if last.close >= swing_high.price + threshold {
                return Some(ChochSignal {
                    direction: ZoneDirection::Bullish,
                    price: last.close,
                    broken_level: swing_high.price,
                    timestamp_ms: last.timestamp_ms,
                });
            }
            None
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
            volume: 100,
        }
    }

    fn hill_bars() -> Vec<Bar> {
        // Rise to a peak at index 3, fall into a valley at index 7, recover
        let closes = [1.10, 1.11, 1.12, 1.14, 1.12, 1.11, 1.10, 1.09, 1.10, 1.11];
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| bar(i as i64 * 900_000, c, c + 0.001, c - 0.001, c))
            .collect()
    }

    #[test]
    fn test_fractal_swings() {
        let bars = hill_bars();
        let (highs, lows) = find_swings(&bars);

        assert_eq!(highs.len(), 1);
        assert_eq!(highs[0].timestamp_ms, 3 * 900_000);
        assert!((highs[0].price - 1.141).abs() < 1e-9);

        assert_eq!(lows.len(), 1);
        assert_eq!(lows[0].timestamp_ms, 7 * 900_000);
        assert!((lows[0].price - 1.089).abs() < 1e-9);
    }

    #[test]
    fn test_bearish_choch_breaks_swing_low() {
        let mut bars = hill_bars();
        // Close 2 pips under the 1.089 swing low: short of the 5-pip
        // threshold
        bars.push(bar(10 * 900_000, 1.10, 1.101, 1.0885, 1.0888));
        assert!(detect_choch("EURUSD", &bars, ZoneDirection::Bearish, 5.0, 0).is_none());

        // 6.5 pips under: breaks structure
        bars.pop();
        bars.push(bar(10 * 900_000, 1.10, 1.101, 1.082, 1.08835));
        let choch = detect_choch("EURUSD", &bars, ZoneDirection::Bearish, 5.0, 0).unwrap();
        assert_eq!(choch.direction, ZoneDirection::Bearish);
        assert!((choch.broken_level - 1.089).abs() < 1e-9);
        assert!((choch.price - 1.08835).abs() < 1e-9);
    }

    #[test]
    fn test_choch_respects_after_gate() {
        let mut bars = hill_bars();
        bars.push(bar(10 * 900_000, 1.10, 1.101, 1.082, 1.0835));
        // The breaking bar closed before the gate: no signal
        let gated = detect_choch("EURUSD", &bars, ZoneDirection::Bearish, 5.0, 10 * 900_000);
        assert!(gated.is_none());
    }

    #[test]
    fn test_bullish_choch_breaks_swing_high() {
        let mut bars = hill_bars();
        bars.push(bar(10 * 900_000, 1.11, 1.1475, 1.109, 1.1470));
        let choch = detect_choch("EURUSD", &bars, ZoneDirection::Bullish, 5.0, 0).unwrap();
        assert_eq!(choch.direction, ZoneDirection::Bullish);
        assert!((choch.broken_level - 1.141).abs() < 1e-9);
    }
}
