/// Decision logger: stdout JSON lines plus the persisted mirror
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::events::types::LogEvent;
use crate::store::LogMirror;

pub struct DecisionLogger {
    mirror: Arc<LogMirror>,
}

impl DecisionLogger {
    pub fn new(mirror: Arc<LogMirror>) -> Self {
        DecisionLogger { mirror }
    }

    /// Emit one JSON object per line on stdout and mirror it
    pub async fn log(&self, event: &LogEvent) {
        let mut value = match serde_json::to_value(event) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unserializable log event: {}", e);
                return;
            }
        };
        if let Some(map) = value.as_object_mut() {
            map.insert("ts".to_string(), serde_json::json!(Utc::now().to_rfc3339()));
        }

        println!("{}", value);
        self.mirror.append(&value).await;
    }

    pub fn mirror(&self) -> &Arc<LogMirror> {
        &self.mirror
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mirrors_event() {
        let mirror = Arc::new(LogMirror::in_memory());
        let logger = DecisionLogger::new(Arc::clone(&mirror));

        logger
            .log(&LogEvent::Conflict {
                symbol: "EURUSD".to_string(),
                smc: "SELL".to_string(),
                rsi: "BUY".to_string(),
            })
            .await;

        let entries = mirror.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["type"], "CONFLITO");
        assert!(entries[0]["ts"].is_string());
    }
}
