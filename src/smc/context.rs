/// Context engine: grades the previous session and derives the bias
/// gate the FSM trades under
use serde::Serialize;

use crate::smc::session::SessionSnapshot;
use crate::types::TradeDirection;
use crate::utils::pip::pip_size;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionGrade {
    GradeA,
    GradeB,
    GradeC,
    NoTrade,
}

impl SessionGrade {
    pub fn as_str(&self) -> &str {
        match self {
            SessionGrade::GradeA => "A",
            SessionGrade::GradeB => "B",
            SessionGrade::GradeC => "C",
            SessionGrade::NoTrade => "NO_TRADE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    pub fn as_str(&self) -> &str {
        match self {
            Bias::Bullish => "BULLISH",
            Bias::Bearish => "BEARISH",
            Bias::Neutral => "NEUTRAL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextDecision {
    pub grade: SessionGrade,
    pub bias: Bias,
    pub can_trade: bool,
    pub block_reason: Option<String>,
    pub allowed_directions: Vec<TradeDirection>,
}

pub struct ContextEngine {
    min_range_pips: f64,
}

impl ContextEngine {
    pub fn new(min_range_pips: f64) -> Self {
        ContextEngine { min_range_pips }
    }

    pub fn evaluate(
        &self,
        symbol: &str,
        previous: &SessionSnapshot,
        current_price: f64,
    ) -> ContextDecision {
        let pip = pip_size(symbol);
        let range_pips = previous.range() / pip;

        if range_pips < self.min_range_pips {
            return ContextDecision {
                grade: SessionGrade::NoTrade,
                bias: Bias::Neutral,
                can_trade: false,
                block_reason: Some(format!(
                    "previous session range {:.1} pips below minimum {:.1}",
                    range_pips, self.min_range_pips
                )),
                allowed_directions: Vec::new(),
            };
        }

        let grade = if range_pips >= self.min_range_pips * 3.0 {
            SessionGrade::GradeA
        } else if range_pips >= self.min_range_pips * 1.5 {
            SessionGrade::GradeB
        } else {
            SessionGrade::GradeC
        };

        let midpoint = (previous.high + previous.low) / 2.0;
        let offset = current_price - midpoint;
        let neutral_band = previous.range() * 0.1;

        let bias = if offset.abs() <= neutral_band {
            Bias::Neutral
        } else if offset > 0.0 {
            Bias::Bullish
        } else {
            Bias::Bearish
        };

        let allowed_directions = match bias {
            Bias::Bullish => vec![TradeDirection::Buy],
            Bias::Bearish => vec![TradeDirection::Sell],
            Bias::Neutral => vec![TradeDirection::Buy, TradeDirection::Sell],
        };

        ContextDecision {
            grade,
            bias,
            can_trade: true,
            block_reason: None,
            allowed_directions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smc::session::SessionType;

    fn session(high: f64, low: f64) -> SessionSnapshot {
        SessionSnapshot {
            session_type: SessionType::London,
            high,
            low,
            open: low,
            close: high,
            start_time_ms: 0,
            end_time_ms: 0,
            is_complete: true,
            candle_count: 20,
        }
    }

    #[test]
    fn test_small_range_is_no_trade() {
        let engine = ContextEngine::new(15.0);
        // 10 pips on EURUSD
        let decision = engine.evaluate("EURUSD", &session(1.1010, 1.1000), 1.1005);
        assert_eq!(decision.grade, SessionGrade::NoTrade);
        assert!(!decision.can_trade);
        assert!(decision.allowed_directions.is_empty());
        assert!(decision.block_reason.unwrap().contains("below minimum"));
    }

    #[test]
    fn test_grading_scales_with_range() {
        let engine = ContextEngine::new(15.0);
        // 20 pips -> C
        let c = engine.evaluate("EURUSD", &session(1.1020, 1.1000), 1.1010);
        assert_eq!(c.grade, SessionGrade::GradeC);
        // 30 pips -> B
        let b = engine.evaluate("EURUSD", &session(1.1030, 1.1000), 1.1015);
        assert_eq!(b.grade, SessionGrade::GradeB);
        // 50 pips -> A
        let a = engine.evaluate("EURUSD", &session(1.1050, 1.1000), 1.1025);
        assert_eq!(a.grade, SessionGrade::GradeA);
    }

    #[test]
    fn test_bias_from_midpoint() {
        let engine = ContextEngine::new(15.0);
        let snapshot = session(1.1050, 1.1000); // midpoint 1.1025

        let bullish = engine.evaluate("EURUSD", &snapshot, 1.1045);
        assert_eq!(bullish.bias, Bias::Bullish);
        assert_eq!(bullish.allowed_directions, vec![TradeDirection::Buy]);

        let bearish = engine.evaluate("EURUSD", &snapshot, 1.1005);
        assert_eq!(bearish.bias, Bias::Bearish);
        assert_eq!(bearish.allowed_directions, vec![TradeDirection::Sell]);

        let neutral = engine.evaluate("EURUSD", &snapshot, 1.1026);
        assert_eq!(neutral.bias, Bias::Neutral);
        assert_eq!(neutral.allowed_directions.len(), 2);
    }
}
