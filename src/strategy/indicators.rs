/// Technical indicators used by the RSI+VWAP strategy
use chrono::{DateTime, Utc};

use crate::types::Bar;

/// RSI with Wilder's smoothing
pub fn calculate_rsi(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.len() < period + 1 {
        return None;
    }

    let mut gains = Vec::new();
    let mut losses = Vec::new();

    for i in 1..bars.len() {
        let change = bars[i].close - bars[i - 1].close;
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(-change);
        }
    }

    let mut avg_gain: f64 = gains.iter().take(period).sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses.iter().take(period).sum::<f64>() / period as f64;

    for i in period..gains.len() {
        avg_gain = ((period - 1) as f64 * avg_gain + gains[i]) / period as f64;
        avg_loss = ((period - 1) as f64 * avg_loss + losses[i]) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Volume-weighted average price anchored at the most recent UTC
/// midnight before `now`
pub fn calculate_vwap(bars: &[Bar], now: DateTime<Utc>) -> Option<f64> {
    let midnight_ms = now
        .date_naive()
        .and_hms_opt(0, 0, 0)?
        .and_utc()
        .timestamp_millis();

    let mut pv_sum = 0.0;
    let mut volume_sum = 0.0;
    for bar in bars.iter().filter(|b| b.timestamp_ms >= midnight_ms) {
        let typical = (bar.high + bar.low + bar.close) / 3.0;
        pv_sum += typical * bar.volume as f64;
        volume_sum += bar.volume as f64;
    }

    if volume_sum == 0.0 {
        return None;
    }
    Some(pv_sum / volume_sum)
}
