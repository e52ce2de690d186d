/// Pip semantics and wire-unit conversions, centralized
use std::collections::HashMap;

/// Wire prices are integers in units of 1/100000
pub const PRICE_SCALE: f64 = 100_000.0;

/// Broker volume units are hundredths of a lot
pub const VOLUME_SCALE: f64 = 100.0;

/// Pip size by symbol class: JPY pairs 0.01, gold 0.1, everything else 0.0001
pub fn pip_size(symbol: &str) -> f64 {
    let upper = symbol.to_uppercase();
    if upper.starts_with("XAU") {
        0.1
    } else if upper.ends_with("JPY") {
        0.01
    } else {
        0.0001
    }
}

/// Contract size in base units per lot
pub fn contract_size(symbol: &str) -> f64 {
    if symbol.to_uppercase().starts_with("XAU") {
        100.0
    } else {
        100_000.0
    }
}

pub fn price_from_wire(raw: i64) -> f64 {
    raw as f64 / PRICE_SCALE
}

pub fn price_to_wire(price: f64) -> i64 {
    (price * PRICE_SCALE).round() as i64
}

/// Lots to broker volume units, rounded up so the broker never sees zero
pub fn lots_to_broker_volume(lots: f64) -> i64 {
    (lots * VOLUME_SCALE).ceil() as i64
}

pub fn broker_volume_to_lots(volume: i64) -> f64 {
    volume as f64 / VOLUME_SCALE
}

/// Quote currency of a symbol name like EURUSD / USDJPY / XAUUSD
pub fn quote_currency(symbol: &str) -> &str {
    let upper_len = symbol.len();
    if upper_len >= 3 {
        &symbol[upper_len - 3..]
    } else {
        symbol
    }
}

/// Monetary value of one pip for `lots`, in USD.
///
/// Direct pairs (quote USD) need no conversion. Indirect and cross pairs
/// use the configured quote-currency → USD rates; an unknown quote
/// currency falls back to 1.0, which keeps sizing conservative for
/// near-parity currencies.
pub fn pip_value_usd(symbol: &str, lots: f64, usd_rates: &HashMap<String, f64>) -> f64 {
    let pip = pip_size(symbol);
    let contract = contract_size(symbol);
    let quote = quote_currency(symbol).to_uppercase();

    let value_in_quote = pip * contract * lots;
    if quote == "USD" {
        return value_in_quote;
    }

    let rate = usd_rates.get(&quote).copied().unwrap_or(1.0);
    value_in_quote * rate
}

/// Price distance in pips
pub fn distance_pips(symbol: &str, a: f64, b: f64) -> f64 {
    (a - b).abs() / pip_size(symbol)
}
