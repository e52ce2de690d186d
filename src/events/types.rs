/// Structured log event definitions. Every record is emitted as one
/// JSON object per line on stdout and mirrored into the append log.
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum LogEvent {
    #[serde(rename = "LOCK_ACQUIRED")]
    LockAcquired {
        symbol: String,
        correlation_id: String,
    },

    #[serde(rename = "LOCK_BLOCKED")]
    LockBlocked {
        symbol: String,
        correlation_id: String,
        age_ms: i64,
    },

    #[serde(rename = "LOCK_RELEASED")]
    LockReleased {
        symbol: String,
        correlation_id: String,
        status: String,
        reason: String,
    },

    #[serde(rename = "LOCK_TIMEOUT")]
    LockTimeout {
        symbol: String,
        correlation_id: String,
        age_ms: i64,
    },

    #[serde(rename = "SMC_INST_STATUS")]
    SmcStatus {
        symbol: String,
        enabled: bool,
        source: String,
        session: String,
        fsm_phase: String,
        trades_this_session: usize,
        max_trades_per_session: usize,
    },

    #[serde(rename = "SMC_INST_DECISION")]
    SmcDecision {
        symbol: String,
        decision: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        direction: Option<String>,
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pool_key: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fvg_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        choch_price: Option<f64>,
    },

    #[serde(rename = "SMC_INST_FSM_TRANSITION")]
    SmcFsmTransition {
        symbol: String,
        from: String,
        to: String,
        trigger: String,
    },

    #[serde(rename = "SMC_INST_POOLS_BUILT")]
    SmcPoolsBuilt {
        symbol: String,
        session: String,
        pool_count: usize,
        swept_count: usize,
    },

    #[serde(rename = "PERFORMANCE")]
    Performance {
        analysis_count: u64,
        trades_executed: u64,
        conflicts: u64,
        avg_cycle_ms: f64,
        last_cycle_ms: i64,
    },

    #[serde(rename = "TRADE")]
    Trade {
        symbol: String,
        direction: String,
        lots: f64,
        entry_price: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_loss: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        take_profit: Option<f64>,
        confidence: f64,
        source: String,
        correlation_id: String,
        safety_latch_triggered: bool,
    },

    #[serde(rename = "CONFLITO")]
    Conflict {
        symbol: String,
        smc: String,
        rsi: String,
    },
}
