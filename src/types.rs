/// Core type definitions for the trading engine
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar, already converted out of wire units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp_ms).unwrap_or_else(Utc::now)
    }
}

/// Live quote from the spot stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub symbol_id: i64,
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub timestamp_ms: i64,
}

impl Tick {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// Broker credentials, immutable for a session
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub account_id: Option<i64>,
    pub is_demo: bool,
}

/// Symbol catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub id: i64,
    pub name: String,
    pub digits: u32,
    pub pip_position: i32,
    pub base_asset_id: i64,
    pub quote_asset_id: i64,
}

/// Broker volume constraints, in lots
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolumeSpecs {
    pub min_volume: f64,
    pub max_volume: f64,
    pub step_volume: f64,
}

/// Account snapshot from the trader endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccountInfo {
    pub balance: f64,
    pub equity: f64,
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn as_str(&self) -> &str {
        match self {
            TradeDirection::Buy => "BUY",
            TradeDirection::Sell => "SELL",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            TradeDirection::Buy => TradeDirection::Sell,
            TradeDirection::Sell => TradeDirection::Buy,
        }
    }
}

/// Order type sent to the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        }
    }
}

/// Open position as seen by the broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub position_id: i64,
    pub symbol: String,
    pub direction: TradeDirection,
    pub volume_lots: f64,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub opened_at_ms: i64,
    pub status: PositionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PositionStatus::Open => "OPEN",
            PositionStatus::Closed => "CLOSED",
        }
    }
}

/// Order request handed to the adapter
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: TradeDirection,
    pub order_type: OrderType,
    pub lots: f64,
    pub stop_loss_pips: Option<f64>,
    pub take_profit_pips: Option<f64>,
    pub comment: String,
}

/// Terminal result of an order submission
#[derive(Debug, Clone, Default)]
pub struct OrderResult {
    pub success: bool,
    pub order_id: Option<i64>,
    pub position_id: Option<i64>,
    pub execution_price: Option<f64>,
    pub error_message: Option<String>,
    pub safety_latch_triggered: bool,
}

/// Timeframe with cTrader wire period ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M2,
    M3,
    M4,
    M5,
    M10,
    M15,
    M30,
    H1,
    H4,
    H12,
    D1,
    W1,
    Mn1,
}

impl Timeframe {
    /// Wire id used by the trendbar endpoints
    pub fn period_id(&self) -> i32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M2 => 2,
            Timeframe::M3 => 3,
            Timeframe::M4 => 4,
            Timeframe::M5 => 5,
            Timeframe::M10 => 6,
            Timeframe::M15 => 7,
            Timeframe::M30 => 8,
            Timeframe::H1 => 9,
            Timeframe::H4 => 10,
            Timeframe::H12 => 11,
            Timeframe::D1 => 12,
            Timeframe::W1 => 13,
            Timeframe::Mn1 => 14,
        }
    }

    pub fn duration_secs(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M2 => 120,
            Timeframe::M3 => 180,
            Timeframe::M4 => 240,
            Timeframe::M5 => 300,
            Timeframe::M10 => 600,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1800,
            Timeframe::H1 => 3600,
            Timeframe::H4 => 14400,
            Timeframe::H12 => 43200,
            Timeframe::D1 => 86400,
            Timeframe::W1 => 604800,
            Timeframe::Mn1 => 2592000,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_secs() * 1000
    }

    pub fn as_str(&self) -> &str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M2 => "M2",
            Timeframe::M3 => "M3",
            Timeframe::M4 => "M4",
            Timeframe::M5 => "M5",
            Timeframe::M10 => "M10",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::H12 => "H12",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
            Timeframe::Mn1 => "MN1",
        }
    }
}

/// Signal produced by a strategy for one symbol
#[derive(Debug, Clone)]
pub struct StrategySignal {
    pub direction: Option<TradeDirection>,
    pub confidence: f64,
    pub reason: String,
    pub stop_loss_pips: Option<f64>,
    pub take_profit_pips: Option<f64>,
}

impl StrategySignal {
    pub fn flat(reason: impl Into<String>) -> Self {
        StrategySignal {
            direction: None,
            confidence: 0.0,
            reason: reason.into(),
            stop_loss_pips: None,
            take_profit_pips: None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.direction.is_some()
    }
}

/// Bundle of bars handed to the strategies each analysis cycle
#[derive(Debug, Clone)]
pub struct MtfBundle {
    pub symbol: String,
    pub h1: Vec<Bar>,
    pub m15: Vec<Bar>,
    pub m5: Vec<Bar>,
    pub bid: f64,
    pub ask: f64,
    pub spread_pips: f64,
}

/// Engine status snapshot for the admin surface
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub is_running: bool,
    pub mode: String,
    pub symbols: Vec<String>,
    pub analysis_count: u64,
    pub trades_executed: u64,
    pub in_flight_orders: Vec<InFlightSnapshot>,
    pub performance: crate::analytics::PerformanceSnapshot,
    pub risk: RiskSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct InFlightSnapshot {
    pub symbol: String,
    pub age_ms: i64,
    pub correlation_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskSnapshot {
    pub daily_pnl: f64,
    pub daily_pnl_percent: f64,
    pub open_trades: usize,
    pub trading_blocked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_period_ids() {
        assert_eq!(Timeframe::M1.period_id(), 1);
        assert_eq!(Timeframe::M5.period_id(), 5);
        assert_eq!(Timeframe::M10.period_id(), 6);
        assert_eq!(Timeframe::M15.period_id(), 7);
        assert_eq!(Timeframe::H1.period_id(), 9);
        assert_eq!(Timeframe::Mn1.period_id(), 14);
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(TradeDirection::Buy.opposite(), TradeDirection::Sell);
        assert_eq!(TradeDirection::Sell.opposite(), TradeDirection::Buy);
    }
}
