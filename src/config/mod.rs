/// Configuration structures for the trading engine
use std::collections::HashMap;

use serde::Deserialize;

use crate::types::Credentials;

pub mod loader;
pub use loader::load_config;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub broker: BrokerConfig,
    pub engine: EngineConfig,
    pub risk: RiskConfig,
    pub smc: SmcConfig,
    pub rsi_vwap: RsiVwapConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub account_id: Option<i64>,
    pub is_demo: bool,
}

impl BrokerConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            access_token: self.access_token.clone(),
            account_id: self.account_id,
            is_demo: self.is_demo,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub symbols: Vec<String>,
    #[serde(default = "default_analysis_interval_secs")]
    pub analysis_interval_secs: u64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    pub max_positions: usize,
    pub max_trades_per_symbol: usize,
    pub cooldown_ms: i64,
    pub max_spread_pips: f64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_inflight_timeout_ms")]
    pub inflight_timeout_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    pub risk_percentage: f64,
    pub daily_loss_limit_percent: f64,
    pub max_open_trades: usize,
    pub circuit_breaker_enabled: bool,
    pub session_filter_enabled: bool,
    /// Session windows in Brasília local time (UTC-3)
    pub london_start: String,
    pub london_end: String,
    pub ny_start: String,
    pub ny_end: String,
    /// Quote currency -> USD conversion rates for pip-value math
    #[serde(default)]
    pub usd_rates: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmcConfig {
    #[serde(default = "default_choch_min_pips")]
    pub choch_min_pips: f64,
    #[serde(default = "default_min_gap_pips")]
    pub min_gap_pips: f64,
    #[serde(default = "default_max_swing_pools")]
    pub max_swing_pools: usize,
    #[serde(default = "default_max_trades_per_session")]
    pub max_trades_per_session: usize,
    #[serde(default = "default_min_session_range_pips")]
    pub min_session_range_pips: f64,
    #[serde(default = "default_stop_loss_pips")]
    pub stop_loss_pips: f64,
    #[serde(default = "default_risk_reward")]
    pub risk_reward: f64,
    /// Per-state timeouts, minutes
    #[serde(default = "default_wait_sweep_timeout_min")]
    pub wait_sweep_timeout_min: i64,
    #[serde(default = "default_wait_choch_timeout_min")]
    pub wait_choch_timeout_min: i64,
    #[serde(default = "default_wait_fvg_timeout_min")]
    pub wait_fvg_timeout_min: i64,
    #[serde(default = "default_wait_mitigation_timeout_min")]
    pub wait_mitigation_timeout_min: i64,
    #[serde(default = "default_wait_entry_timeout_min")]
    pub wait_entry_timeout_min: i64,
    #[serde(default = "default_cooldown_min")]
    pub cooldown_min: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RsiVwapConfig {
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: f64,
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,
    #[serde(default = "default_rsi_stop_loss_pips")]
    pub stop_loss_pips: f64,
    #[serde(default = "default_rsi_risk_reward")]
    pub risk_reward: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub state_path: String,
    pub log_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

fn default_analysis_interval_secs() -> u64 {
    30
}

fn default_refresh_interval_secs() -> u64 {
    300
}

fn default_min_confidence() -> f64 {
    50.0
}

fn default_inflight_timeout_ms() -> i64 {
    30_000
}

fn default_choch_min_pips() -> f64 {
    5.0
}

fn default_min_gap_pips() -> f64 {
    2.0
}

fn default_max_swing_pools() -> usize {
    3
}

fn default_max_trades_per_session() -> usize {
    2
}

fn default_min_session_range_pips() -> f64 {
    15.0
}

fn default_stop_loss_pips() -> f64 {
    12.0
}

fn default_risk_reward() -> f64 {
    2.0
}

fn default_wait_sweep_timeout_min() -> i64 {
    90
}

fn default_wait_choch_timeout_min() -> i64 {
    60
}

fn default_wait_fvg_timeout_min() -> i64 {
    60
}

fn default_wait_mitigation_timeout_min() -> i64 {
    90
}

fn default_wait_entry_timeout_min() -> i64 {
    30
}

fn default_cooldown_min() -> i64 {
    20
}

fn default_rsi_period() -> usize {
    14
}

fn default_rsi_oversold() -> f64 {
    30.0
}

fn default_rsi_overbought() -> f64 {
    70.0
}

fn default_rsi_stop_loss_pips() -> f64 {
    10.0
}

fn default_rsi_risk_reward() -> f64 {
    1.5
}

fn default_log_level() -> String {
    "smcbot=info".to_string()
}
