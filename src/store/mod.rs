/// Persistence collaborator consumed by the core: a key/value state
/// store plus an append-only log mirror. Backed by a JSON state file
/// and a JSONL log; with no paths configured everything stays in
/// memory, which is what the tests use.
use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{BotError, Result};
use crate::types::Position;

const KEY_ACTIVE_SYMBOLS: &str = "active_symbols";
const KEY_OPEN_POSITIONS: &str = "open_positions";

pub struct StateStore {
    path: Option<PathBuf>,
    cache: RwLock<HashMap<String, Value>>,
}

impl StateStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        StateStore {
            path,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Load the persisted state file into the cache (startup only)
    pub async fn load(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.exists() {
            debug!("No existing state file at {}", path.display());
            return Ok(());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let map: HashMap<String, Value> = serde_json::from_str(&content)
            .map_err(|e| BotError::Store(format!("corrupt state file: {}", e)))?;

        let mut cache = self.cache.write().await;
        *cache = map;
        debug!("Loaded {} state keys from {}", cache.len(), path.display());
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let cache = self.cache.read().await;
        cache.get(key).cloned()
    }

    pub async fn put(&self, key: &str, value: Value) -> Result<()> {
        {
            let mut cache = self.cache.write().await;
            cache.insert(key.to_string(), value);
        }
        self.flush().await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        {
            let mut cache = self.cache.write().await;
            cache.remove(key);
        }
        self.flush().await
    }

    /// Active symbols are canonically a JSON array. A legacy
    /// JSON-encoded string form is accepted on read and rewritten as an
    /// array on the next put.
    pub async fn get_active_symbols(&self) -> Vec<String> {
        match self.get(KEY_ACTIVE_SYMBOLS).await {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            Some(Value::String(raw)) => serde_json::from_str::<Vec<String>>(&raw)
                .unwrap_or_else(|_| {
                    warn!("Unparseable active_symbols string: {}", raw);
                    Vec::new()
                }),
            _ => Vec::new(),
        }
    }

    pub async fn set_active_symbols(&self, symbols: &[String]) -> Result<()> {
        self.put(KEY_ACTIVE_SYMBOLS, serde_json::json!(symbols)).await
    }

    /// Persisted open positions, the engine's database-side view
    pub async fn open_positions(&self) -> Vec<Position> {
        match self.get(KEY_OPEN_POSITIONS).await {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    pub async fn open_positions_for(&self, symbol: &str) -> Vec<Position> {
        self.open_positions()
            .await
            .into_iter()
            .filter(|p| p.symbol == symbol)
            .collect()
    }

    pub async fn record_open_position(&self, position: &Position) -> Result<()> {
        let mut positions = self.open_positions().await;
        positions.retain(|p| p.position_id != position.position_id);
        positions.push(position.clone());
        self.put(KEY_OPEN_POSITIONS, serde_json::to_value(&positions)?)
            .await
    }

    /// Replace the persisted view with the broker's reconciled truth
    pub async fn replace_open_positions(&self, positions: &[Position]) -> Result<()> {
        self.put(KEY_OPEN_POSITIONS, serde_json::to_value(positions)?)
            .await
    }

    async fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let snapshot = {
            let cache = self.cache.read().await;
            serde_json::to_string_pretty(&*cache)?
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
        tokio::fs::write(path, snapshot).await?;
        Ok(())
    }
}

/// Append-only mirror of structured log events (JSONL). With no path
/// configured, events are retained in memory for inspection in tests.
pub struct LogMirror {
    path: Option<PathBuf>,
    memory: RwLock<Vec<Value>>,
}

impl LogMirror {
    pub fn new(path: Option<PathBuf>) -> Self {
        LogMirror {
            path,
            memory: RwLock::new(Vec::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub async fn append(&self, value: &Value) {
        match &self.path {
            Some(path) => {
                if let Err(e) = self.append_to_file(path.clone(), value).await {
                    warn!("Log mirror append failed: {}", e);
                }
            }
            None => {
                let mut memory = self.memory.write().await;
                memory.push(value.clone());
            }
        }
    }

    pub async fn entries(&self) -> Vec<Value> {
        let memory = self.memory.read().await;
        memory.clone()
    }

    async fn append_to_file(&self, path: PathBuf, value: &Value) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let line = serde_json::to_string(value)?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PositionStatus, TradeDirection};

    fn position(id: i64, symbol: &str) -> Position {
        Position {
            position_id: id,
            symbol: symbol.to_string(),
            direction: TradeDirection::Buy,
            volume_lots: 0.1,
            entry_price: 1.1,
            stop_loss: None,
            take_profit: None,
            opened_at_ms: 0,
            status: PositionStatus::Open,
        }
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = StateStore::in_memory();
        store.put("k", serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap()["a"], 1);
        store.remove("k").await.unwrap();
        assert!(store.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_active_symbols_canonical_array() {
        let store = StateStore::in_memory();
        store
            .set_active_symbols(&["EURUSD".to_string(), "GBPUSD".to_string()])
            .await
            .unwrap();
        assert_eq!(store.get_active_symbols().await, vec!["EURUSD", "GBPUSD"]);
        // Stored form is an actual array
        assert!(store.get("active_symbols").await.unwrap().is_array());
    }

    #[tokio::test]
    async fn test_active_symbols_legacy_string_form() {
        let store = StateStore::in_memory();
        store
            .put("active_symbols", serde_json::json!("[\"EURUSD\"]"))
            .await
            .unwrap();
        assert_eq!(store.get_active_symbols().await, vec!["EURUSD"]);
    }

    #[tokio::test]
    async fn test_open_positions_by_symbol() {
        let store = StateStore::in_memory();
        store.record_open_position(&position(1, "EURUSD")).await.unwrap();
        store.record_open_position(&position(2, "GBPUSD")).await.unwrap();
        store.record_open_position(&position(3, "EURUSD")).await.unwrap();

        assert_eq!(store.open_positions().await.len(), 3);
        assert_eq!(store.open_positions_for("EURUSD").await.len(), 2);

        // Reconcile replaces the whole view
        store
            .replace_open_positions(&[position(3, "EURUSD")])
            .await
            .unwrap();
        assert_eq!(store.open_positions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_log_mirror_in_memory() {
        let mirror = LogMirror::in_memory();
        mirror.append(&serde_json::json!({"type": "TRADE"})).await;
        let entries = mirror.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["type"], "TRADE");
    }
}
