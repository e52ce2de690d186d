/// Multi-timeframe bar cache: per (symbol, timeframe) ordered bars with
/// upsert-by-timestamp merge and bounded retention
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{Bar, Timeframe};

/// Most recent bars kept per (symbol, timeframe)
const MAX_BARS: usize = 300;

#[derive(Default)]
struct Inner {
    bars: HashMap<(String, Timeframe), Vec<Bar>>,
}

/// Snapshot-read store shared between the refresh loop (writer) and the
/// analysis loop (reader)
pub struct MtfStore {
    inner: Arc<RwLock<Inner>>,
}

impl MtfStore {
    pub fn new() -> Self {
        MtfStore {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Upsert incoming bars by timestamp (last write wins, since
    /// unclosed bars update in place), re-sort, and trim to the
    /// retention cap.
    pub async fn merge_bars(&self, symbol: &str, timeframe: Timeframe, new_bars: &[Bar]) {
        if new_bars.is_empty() {
            return;
        }

        let mut inner = self.inner.write().await;
        let slot = inner
            .bars
            .entry((symbol.to_string(), timeframe))
            .or_default();

        for bar in new_bars {
            match slot.iter_mut().find(|b| b.timestamp_ms == bar.timestamp_ms) {
                Some(existing) => *existing = bar.clone(),
                None => slot.push(bar.clone()),
            }
        }

        slot.sort_by_key(|b| b.timestamp_ms);
        if slot.len() > MAX_BARS {
            let excess = slot.len() - MAX_BARS;
            slot.drain(..excess);
        }

        debug!(
            "Merged {} {} bars for {} ({} retained)",
            new_bars.len(),
            timeframe.as_str(),
            symbol,
            slot.len()
        );
    }

    /// Consistent snapshot of up to `count` most recent bars
    pub async fn get_bars(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Vec<Bar> {
        let inner = self.inner.read().await;
        match inner.bars.get(&(symbol.to_string(), timeframe)) {
            Some(bars) => {
                let start = bars.len().saturating_sub(count);
                bars[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    pub async fn bar_count(&self, symbol: &str, timeframe: Timeframe) -> usize {
        let inner = self.inner.read().await;
        inner
            .bars
            .get(&(symbol.to_string(), timeframe))
            .map(|b| b.len())
            .unwrap_or(0)
    }

    pub async fn clear(&self, symbol: &str) {
        let mut inner = self.inner.write().await;
        inner.bars.retain(|(s, _), _| s != symbol);
    }
}

impl Default for MtfStore {
    fn default() -> Self {
        Self::new()
    }
}
