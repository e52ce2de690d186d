/// Performance counters feeding the PERFORMANCE event and the status
/// endpoint
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceSnapshot {
    pub analysis_count: u64,
    pub trades_executed: u64,
    pub signals_generated: u64,
    pub conflicts: u64,
    pub avg_cycle_ms: f64,
    pub last_cycle_ms: i64,
}

#[derive(Default)]
struct Inner {
    analysis_count: u64,
    trades_executed: u64,
    signals_generated: u64,
    conflicts: u64,
    total_cycle_ms: i64,
    last_cycle_ms: i64,
}

pub struct PerformanceTracker {
    inner: RwLock<Inner>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        PerformanceTracker {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub async fn record_cycle(&self, elapsed_ms: i64) {
        let mut inner = self.inner.write().await;
        inner.analysis_count += 1;
        inner.total_cycle_ms += elapsed_ms;
        inner.last_cycle_ms = elapsed_ms;
    }

    pub async fn record_signal(&self) {
        let mut inner = self.inner.write().await;
        inner.signals_generated += 1;
    }

    pub async fn record_trade(&self) {
        let mut inner = self.inner.write().await;
        inner.trades_executed += 1;
    }

    pub async fn record_conflict(&self) {
        let mut inner = self.inner.write().await;
        inner.conflicts += 1;
    }

    pub async fn snapshot(&self) -> PerformanceSnapshot {
        let inner = self.inner.read().await;
        PerformanceSnapshot {
            analysis_count: inner.analysis_count,
            trades_executed: inner.trades_executed,
            signals_generated: inner.signals_generated,
            conflicts: inner.conflicts,
            avg_cycle_ms: if inner.analysis_count > 0 {
                inner.total_cycle_ms as f64 / inner.analysis_count as f64
            } else {
                0.0
            },
            last_cycle_ms: inner.last_cycle_ms,
        }
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_and_average() {
        let tracker = PerformanceTracker::new();
        tracker.record_cycle(10).await;
        tracker.record_cycle(30).await;
        tracker.record_trade().await;
        tracker.record_conflict().await;

        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.analysis_count, 2);
        assert_eq!(snapshot.trades_executed, 1);
        assert_eq!(snapshot.conflicts, 1);
        assert_eq!(snapshot.avg_cycle_ms, 20.0);
        assert_eq!(snapshot.last_cycle_ms, 30);
    }
}
