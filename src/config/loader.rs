/// Configuration loading from TOML file
use std::path::Path;

use crate::config::Config;
use crate::error::{BotError, Result};
use crate::utils::parse_clock;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| BotError::Config(format!("Failed to read config file: {}", e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| BotError::Config(format!("Failed to parse config: {}", e)))?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<()> {
    if config.engine.symbols.is_empty() {
        return Err(BotError::Config("engine.symbols is empty".to_string()));
    }

    if config.engine.max_positions == 0 {
        return Err(BotError::Config("engine.max_positions must be >= 1".to_string()));
    }

    if config.engine.max_trades_per_symbol == 0 {
        return Err(BotError::Config(
            "engine.max_trades_per_symbol must be >= 1".to_string(),
        ));
    }

    if config.engine.max_spread_pips <= 0.0 {
        return Err(BotError::Config(format!(
            "Invalid engine.max_spread_pips: {}",
            config.engine.max_spread_pips
        )));
    }

    if config.risk.risk_percentage <= 0.0 || config.risk.risk_percentage > 10.0 {
        return Err(BotError::Config(format!(
            "Invalid risk.risk_percentage: {}",
            config.risk.risk_percentage
        )));
    }

    if config.risk.daily_loss_limit_percent <= 0.0 {
        return Err(BotError::Config(format!(
            "Invalid risk.daily_loss_limit_percent: {}",
            config.risk.daily_loss_limit_percent
        )));
    }

    for (label, value) in [
        ("risk.london_start", &config.risk.london_start),
        ("risk.london_end", &config.risk.london_end),
        ("risk.ny_start", &config.risk.ny_start),
        ("risk.ny_end", &config.risk.ny_end),
    ] {
        if parse_clock(value).is_none() {
            return Err(BotError::Config(format!("Invalid clock string {}: {}", label, value)));
        }
    }

    if config.smc.choch_min_pips <= 0.0 || config.smc.min_gap_pips <= 0.0 {
        return Err(BotError::Config(
            "smc pip thresholds must be positive".to_string(),
        ));
    }

    if config.rsi_vwap.rsi_period < 2 {
        return Err(BotError::Config("rsi_vwap.rsi_period must be >= 2".to_string()));
    }

    if config.rsi_vwap.rsi_oversold >= config.rsi_vwap.rsi_overbought {
        return Err(BotError::Config(
            "rsi_oversold must be < rsi_overbought".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> String {
        r#"
[broker]
client_id = "abc"
client_secret = "xyz"
access_token = "t"
is_demo = true

[engine]
symbols = ["EURUSD", "GBPUSD"]
max_positions = 3
max_trades_per_symbol = 1
cooldown_ms = 300000
max_spread_pips = 2.5

[risk]
risk_percentage = 1.0
daily_loss_limit_percent = 3.0
max_open_trades = 3
circuit_breaker_enabled = true
session_filter_enabled = true
london_start = "04:00"
london_end = "09:00"
ny_start = "09:30"
ny_end = "14:00"

[smc]

[rsi_vwap]

[store]
state_path = "data/state.json"
log_path = "data/decisions.jsonl"
"#
        .to_string()
    }

    #[test]
    fn test_parse_and_validate() {
        let config: Config = toml::from_str(&sample_toml()).unwrap();
        validate_config(&config).unwrap();

        assert_eq!(config.engine.symbols.len(), 2);
        assert_eq!(config.engine.analysis_interval_secs, 30);
        assert_eq!(config.engine.refresh_interval_secs, 300);
        assert_eq!(config.engine.min_confidence, 50.0);
        assert_eq!(config.smc.choch_min_pips, 5.0);
        assert_eq!(config.smc.min_gap_pips, 2.0);
        assert_eq!(config.rsi_vwap.rsi_period, 14);
    }

    #[test]
    fn test_rejects_bad_clock() {
        let bad = sample_toml().replace("\"04:00\"", "\"4am\"");
        let config: Config = toml::from_str(&bad).unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_empty_symbols() {
        let bad = sample_toml().replace("[\"EURUSD\", \"GBPUSD\"]", "[]");
        let config: Config = toml::from_str(&bad).unwrap();
        assert!(validate_config(&config).is_err());
    }
}
