/// Per-symbol in-flight order registry: the anti-double-submission
/// lock, its watchdog, and the lock lifecycle events
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use crate::events::{DecisionLogger, LogEvent};
use crate::types::InFlightSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InFlightStatus {
    Pending,
    Sent,
    Confirmed,
    Failed,
    Timeout,
}

impl InFlightStatus {
    pub fn as_str(&self) -> &str {
        match self {
            InFlightStatus::Pending => "pending",
            InFlightStatus::Sent => "sent",
            InFlightStatus::Confirmed => "confirmed",
            InFlightStatus::Failed => "failed",
            InFlightStatus::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InFlightOrder {
    pub correlation_id: String,
    pub created_at_ms: i64,
    pub status: InFlightStatus,
}

pub struct InFlightRegistry {
    timeout_ms: i64,
    orders: Mutex<HashMap<String, InFlightOrder>>,
    logger: Arc<DecisionLogger>,
}

impl InFlightRegistry {
    pub fn new(timeout_ms: i64, logger: Arc<DecisionLogger>) -> Self {
        InFlightRegistry {
            timeout_ms,
            orders: Mutex::new(HashMap::new()),
            logger,
        }
    }

    /// Compare-and-set acquisition. At most one live record per symbol;
    /// a younger-than-timeout record blocks, anything older is replaced.
    pub async fn try_acquire(&self, symbol: &str, now_ms: i64) -> Option<String> {
        let correlation_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();

        let blocked = {
            let mut orders = self.orders.lock().await;
            match orders.get(symbol) {
                Some(existing) if now_ms - existing.created_at_ms < self.timeout_ms => {
                    Some((existing.correlation_id.clone(), now_ms - existing.created_at_ms))
                }
                _ => {
                    orders.insert(
                        symbol.to_string(),
                        InFlightOrder {
                            correlation_id: correlation_id.clone(),
                            created_at_ms: now_ms,
                            status: InFlightStatus::Pending,
                        },
                    );
                    None
                }
            }
        };

        match blocked {
            Some((existing_id, age_ms)) => {
                self.logger
                    .log(&LogEvent::LockBlocked {
                        symbol: symbol.to_string(),
                        correlation_id: existing_id,
                        age_ms,
                    })
                    .await;
                None
            }
            None => {
                self.logger
                    .log(&LogEvent::LockAcquired {
                        symbol: symbol.to_string(),
                        correlation_id: correlation_id.clone(),
                    })
                    .await;
                Some(correlation_id)
            }
        }
    }

    pub async fn mark_sent(&self, symbol: &str) {
        let mut orders = self.orders.lock().await;
        if let Some(order) = orders.get_mut(symbol) {
            order.status = InFlightStatus::Sent;
        }
    }

    /// Remove the record with a terminal status and a reason
    pub async fn release(&self, symbol: &str, status: InFlightStatus, reason: &str) {
        let removed = {
            let mut orders = self.orders.lock().await;
            orders.remove(symbol)
        };
        if let Some(order) = removed {
            self.logger
                .log(&LogEvent::LockReleased {
                    symbol: symbol.to_string(),
                    correlation_id: order.correlation_id,
                    status: status.as_str().to_string(),
                    reason: reason.to_string(),
                })
                .await;
        }
    }

    /// Clear every record older than the timeout. Runs on each analysis
    /// tick.
    pub async fn watchdog_sweep(&self, now_ms: i64) -> usize {
        let stale: Vec<(String, InFlightOrder)> = {
            let mut orders = self.orders.lock().await;
            let keys: Vec<String> = orders
                .iter()
                .filter(|(_, o)| now_ms - o.created_at_ms >= self.timeout_ms)
                .map(|(s, _)| s.clone())
                .collect();
            keys.into_iter()
                .filter_map(|k| orders.remove(&k).map(|o| (k, o)))
                .collect()
        };

        let count = stale.len();
        for (symbol, order) in stale {
            warn!(
                "⏱️  In-flight order for {} stuck for {}ms - cleared",
                symbol,
                now_ms - order.created_at_ms
            );
            self.logger
                .log(&LogEvent::LockTimeout {
                    symbol,
                    correlation_id: order.correlation_id,
                    age_ms: now_ms - order.created_at_ms,
                })
                .await;
        }
        count
    }

    pub async fn clear_all(&self, reason: &str) {
        let symbols: Vec<String> = {
            let orders = self.orders.lock().await;
            orders.keys().cloned().collect()
        };
        for symbol in symbols {
            self.release(&symbol, InFlightStatus::Failed, reason).await;
        }
    }

    pub async fn snapshot(&self, now_ms: i64) -> Vec<InFlightSnapshot> {
        let orders = self.orders.lock().await;
        orders
            .iter()
            .map(|(symbol, order)| InFlightSnapshot {
                symbol: symbol.clone(),
                age_ms: now_ms - order.created_at_ms,
                correlation_id: order.correlation_id.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LogMirror;

    fn registry(timeout_ms: i64) -> (Arc<InFlightRegistry>, Arc<LogMirror>) {
        let mirror = Arc::new(LogMirror::in_memory());
        let logger = Arc::new(DecisionLogger::new(Arc::clone(&mirror)));
        (Arc::new(InFlightRegistry::new(timeout_ms, logger)), mirror)
    }

    #[tokio::test]
    async fn test_exactly_one_winner_under_contention() {
        let (registry, mirror) = registry(30_000);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.try_acquire("EURUSD", 1_000).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let entries = mirror.entries().await;
        let acquired = entries.iter().filter(|e| e["type"] == "LOCK_ACQUIRED").count();
        let blocked = entries.iter().filter(|e| e["type"] == "LOCK_BLOCKED").count();
        assert_eq!(acquired, 1);
        assert_eq!(blocked, 7);
    }

    #[tokio::test]
    async fn test_release_allows_reacquire() {
        let (registry, _mirror) = registry(30_000);

        assert!(registry.try_acquire("EURUSD", 1_000).await.is_some());
        assert!(registry.try_acquire("EURUSD", 2_000).await.is_none());

        registry
            .release("EURUSD", InFlightStatus::Confirmed, "order confirmed")
            .await;
        assert!(registry.try_acquire("EURUSD", 3_000).await.is_some());
    }

    #[tokio::test]
    async fn test_symbols_are_independent() {
        let (registry, _mirror) = registry(30_000);
        assert!(registry.try_acquire("EURUSD", 1_000).await.is_some());
        assert!(registry.try_acquire("GBPUSD", 1_000).await.is_some());
    }

    #[tokio::test]
    async fn test_watchdog_clears_stale_locks() {
        let (registry, mirror) = registry(30_000);
        registry.try_acquire("EURUSD", 1_000).await.unwrap();

        // Young lock survives the sweep
        assert_eq!(registry.watchdog_sweep(20_000).await, 0);
        assert_eq!(registry.snapshot(20_000).await.len(), 1);

        // Past the timeout it is cleared with a LOCK_TIMEOUT event
        assert_eq!(registry.watchdog_sweep(31_001).await, 1);
        assert!(registry.snapshot(31_001).await.is_empty());

        let entries = mirror.entries().await;
        let timeout = entries
            .iter()
            .find(|e| e["type"] == "LOCK_TIMEOUT")
            .expect("timeout event");
        assert_eq!(timeout["symbol"], "EURUSD");

        // And a new acquisition works
        assert!(registry.try_acquire("EURUSD", 32_000).await.is_some());
    }

    #[tokio::test]
    async fn test_stale_lock_is_replaced_on_acquire() {
        let (registry, _mirror) = registry(30_000);
        registry.try_acquire("EURUSD", 1_000).await.unwrap();
        // 30s later the record is stale; acquire steals it
        assert!(registry.try_acquire("EURUSD", 31_001).await.is_some());
    }

    #[tokio::test]
    async fn test_correlation_id_is_8_hex_chars() {
        let (registry, _mirror) = registry(30_000);
        let id = registry.try_acquire("EURUSD", 1_000).await.unwrap();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
