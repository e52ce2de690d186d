pub mod indicators;
pub mod rsi_vwap;

pub use rsi_vwap::RsiVwapStrategy;
