/// Smart-Money-Concepts institutional engine: session tracking,
/// liquidity pools, FVG detection and the per-symbol entry FSM
use serde::{Deserialize, Serialize};

pub mod context;
pub mod fsm;
pub mod fvg;
pub mod liquidity;
pub mod session;
pub mod strategy;
pub mod structure;

pub use context::{Bias, ContextDecision, ContextEngine, SessionGrade};
pub use fsm::{InstEvent, InstState, TransitionRecord};
pub use fvg::{FvgEngine, FvgZone};
pub use liquidity::{LiquidityEngine, LiquidityPool, PoolType, SweepEvent};
pub use session::{SessionSnapshot, SessionTracker, SessionType};
pub use strategy::SmcStrategy;
pub use structure::{ChochSignal, SwingPoint};

use crate::types::TradeDirection;

/// Direction of a structure/imbalance zone. A swept HIGH arms bearish
/// setups, a swept LOW arms bullish ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneDirection {
    Bullish,
    Bearish,
}

impl ZoneDirection {
    pub fn as_str(&self) -> &str {
        match self {
            ZoneDirection::Bullish => "BULLISH",
            ZoneDirection::Bearish => "BEARISH",
        }
    }

    pub fn trade_direction(&self) -> TradeDirection {
        match self {
            ZoneDirection::Bullish => TradeDirection::Buy,
            ZoneDirection::Bearish => TradeDirection::Sell,
        }
    }
}
