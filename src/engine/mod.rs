pub mod inflight;
pub mod trading;

pub use inflight::{InFlightRegistry, InFlightStatus};
pub use trading::TradingEngine;
