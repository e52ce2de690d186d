pub mod performance;

pub use performance::{PerformanceSnapshot, PerformanceTracker};
