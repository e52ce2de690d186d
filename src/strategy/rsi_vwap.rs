/// RSI+VWAP mean-reversion strategy: oversold under VWAP buys,
/// overbought above VWAP sells
use chrono::{DateTime, Utc};

use crate::config::RsiVwapConfig;
use crate::strategy::indicators::{calculate_rsi, calculate_vwap};
use crate::types::{MtfBundle, StrategySignal, Timeframe, TradeDirection};
use crate::utils::time::closed_bars;

pub struct RsiVwapStrategy {
    config: RsiVwapConfig,
}

impl RsiVwapStrategy {
    pub fn new(config: RsiVwapConfig) -> Self {
        RsiVwapStrategy { config }
    }

    pub fn analyze(&self, bundle: &MtfBundle, now: DateTime<Utc>) -> StrategySignal {
        let m5 = closed_bars(&bundle.m5, Timeframe::M5, now.timestamp_millis());
        if m5.len() < self.config.rsi_period + 1 {
            return StrategySignal::flat("insufficient M5 data for RSI");
        }

        let Some(rsi) = calculate_rsi(&m5, self.config.rsi_period) else {
            return StrategySignal::flat("RSI unavailable");
        };
        let Some(vwap) = calculate_vwap(&m5, now) else {
            return StrategySignal::flat("VWAP unavailable");
        };

        let price = (bundle.bid + bundle.ask) / 2.0;

        if rsi <= self.config.rsi_oversold && price < vwap {
            let confidence = (55.0 + (self.config.rsi_oversold - rsi) * 2.0).min(90.0);
            return StrategySignal {
                direction: Some(TradeDirection::Buy),
                confidence,
                reason: format!(
                    "RSI+VWAP: rsi {:.1} oversold, price {:.5} under vwap {:.5}",
                    rsi, price, vwap
                ),
                stop_loss_pips: Some(self.config.stop_loss_pips),
                take_profit_pips: Some(self.config.stop_loss_pips * self.config.risk_reward),
            };
        }

        if rsi >= self.config.rsi_overbought && price > vwap {
            let confidence = (55.0 + (rsi - self.config.rsi_overbought) * 2.0).min(90.0);
            return StrategySignal {
                direction: Some(TradeDirection::Sell),
                confidence,
                reason: format!(
                    "RSI+VWAP: rsi {:.1} overbought, price {:.5} over vwap {:.5}",
                    rsi, price, vwap
                ),
                stop_loss_pips: Some(self.config.stop_loss_pips),
                take_profit_pips: Some(self.config.stop_loss_pips * self.config.risk_reward),
            };
        }

        StrategySignal::flat(format!("RSI {:.1} neutral vs vwap {:.5}", rsi, vwap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bar;
    use chrono::TimeZone;

    fn config() -> RsiVwapConfig {
        RsiVwapConfig {
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            stop_loss_pips: 10.0,
            risk_reward: 1.5,
        }
    }

    fn bundle(m5: Vec<Bar>, bid: f64, ask: f64) -> MtfBundle {
        MtfBundle {
            symbol: "EURUSD".to_string(),
            h1: Vec::new(),
            m15: Vec::new(),
            m5,
            bid,
            ask,
            spread_pips: 1.0,
        }
    }

    fn falling_bars(start_ms: i64) -> Vec<Bar> {
        (0..30)
            .map(|i| {
                let close = 1.12 - i as f64 * 0.0008;
                Bar {
                    timestamp_ms: start_ms + i * 300_000,
                    open: close + 0.0004,
                    high: close + 0.0008,
                    low: close - 0.0004,
                    close,
                    volume: 100,
                }
            })
            .collect()
    }

    #[test]
    fn test_oversold_under_vwap_buys() {
        let start = Utc
            .with_ymd_and_hms(2025, 6, 10, 2, 0, 0)
            .unwrap()
            .timestamp_millis();
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 5, 0, 0).unwrap();
        let bars = falling_bars(start);
        let last_close = bars.last().unwrap().close;

        let signal = RsiVwapStrategy::new(config()).analyze(
            &bundle(bars, last_close - 0.0001, last_close + 0.0001),
            now,
        );
        assert_eq!(signal.direction, Some(TradeDirection::Buy));
        assert!(signal.confidence >= 55.0);
        assert_eq!(signal.stop_loss_pips, Some(10.0));
        assert_eq!(signal.take_profit_pips, Some(15.0));
    }

    #[test]
    fn test_oversold_above_vwap_stays_flat() {
        let start = Utc
            .with_ymd_and_hms(2025, 6, 10, 2, 0, 0)
            .unwrap()
            .timestamp_millis();
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 5, 0, 0).unwrap();
        let bars = falling_bars(start);

        // Price quoted far above VWAP: the filter rejects the long
        let signal =
            RsiVwapStrategy::new(config()).analyze(&bundle(bars, 1.20, 1.2002), now);
        assert!(signal.direction.is_none());
    }

    #[test]
    fn test_insufficient_data() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 5, 0, 0).unwrap();
        let signal = RsiVwapStrategy::new(config()).analyze(&bundle(Vec::new(), 1.1, 1.1002), now);
        assert!(signal.direction.is_none());
        assert!(signal.reason.contains("insufficient"));
    }
}
