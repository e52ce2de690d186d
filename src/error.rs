/// Centralized error types for the trading engine
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    // Transport
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    #[error("Disconnected: {0}")]
    Disconnected(String),

    // Request lifecycle
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Broker rejected request: {code} - {description}")]
    Broker { code: String, description: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    // Authentication
    #[error("Authentication failed: {0}")]
    Auth(String),

    // Codec
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Unknown payload type: {0}")]
    UnknownPayloadType(u32),

    // Domain
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Spread too wide: {0}")]
    SpreadTooWide(String),

    #[error("Risk denied: {0}")]
    RiskDenied(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Order placement failed: {0}")]
    OrderPlacementFailed(String),

    // Persistence
    #[error("Store error: {0}")]
    Store(String),

    // Configuration
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization
    #[error("Serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, BotError>;

impl BotError {
    /// Errors the reconnect loop may retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BotError::Transport(_)
                | BotError::Disconnected(_)
                | BotError::Timeout(_)
                | BotError::RateLimit(_)
        )
    }

    /// Errors that must surface to the operator and stop the connect attempt
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Auth(_) | BotError::Config(_))
    }

    /// Short code for structured logging
    pub fn error_code(&self) -> &str {
        match self {
            BotError::Transport(_) => "NET_001",
            BotError::Handshake(_) => "NET_002",
            BotError::Disconnected(_) => "NET_003",
            BotError::Timeout(_) => "REQ_001",
            BotError::Broker { .. } => "REQ_002",
            BotError::RateLimit(_) => "REQ_003",
            BotError::Auth(_) => "AUTH_001",
            BotError::Codec(_) => "WIRE_001",
            BotError::UnknownPayloadType(_) => "WIRE_002",
            BotError::SymbolNotFound(_) => "SYM_001",
            BotError::SpreadTooWide(_) => "ORDER_001",
            BotError::RiskDenied(_) => "RISK_001",
            BotError::InvariantViolation(_) => "INV_001",
            BotError::InsufficientData(_) => "DATA_001",
            BotError::OrderPlacementFailed(_) => "ORDER_002",
            BotError::Store(_) => "STORE_001",
            BotError::Config(_) => "CFG_001",
            BotError::Serde(_) => "SER_001",
            BotError::Io(_) => "FILE_001",
            BotError::Internal(_) => "INT_001",
        }
    }

    /// True when the broker error text looks like a request-frequency rejection
    pub fn is_rate_limit_text(text: &str) -> bool {
        let lower = text.to_lowercase();
        lower.contains("429")
            || lower.contains("rate")
            || lower.contains("limit")
            || lower.contains("frequency")
            || lower.contains("too many")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_text_detection() {
        assert!(BotError::is_rate_limit_text("REQUEST_FREQUENCY_EXCEEDED"));
        assert!(BotError::is_rate_limit_text("HTTP 429"));
        assert!(BotError::is_rate_limit_text("Too Many Requests"));
        assert!(BotError::is_rate_limit_text("rate limit hit"));
        assert!(!BotError::is_rate_limit_text("NOT_AUTHORIZED"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(BotError::Timeout("t".into()).is_recoverable());
        assert!(BotError::Disconnected("d".into()).is_recoverable());
        assert!(!BotError::Auth("a".into()).is_recoverable());
        assert!(BotError::Auth("a".into()).is_fatal());
    }
}
