pub mod logger;
pub mod types;

pub use logger::DecisionLogger;
pub use types::LogEvent;
