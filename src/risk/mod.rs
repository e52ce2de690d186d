pub mod manager;

pub use manager::{CanOpen, PositionSize, RiskManager, RiskState};
