/// Candle-close arithmetic and trading-day boundaries
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc};

use crate::types::{Bar, Timeframe};

/// NY close, the trading-day boundary (21:00 UTC)
pub const TRADING_DAY_ANCHOR_HOUR: u32 = 21;

/// A candle is closed once its whole interval lies in the past.
/// This is the single look-ahead gate: nothing downstream may consume a
/// bar for which this returns false.
pub fn is_candle_closed(open_ts_ms: i64, timeframe: Timeframe, now_ms: i64) -> bool {
    open_ts_ms + timeframe.duration_ms() <= now_ms
}

/// Closed bars only, preserving order
pub fn closed_bars(bars: &[Bar], timeframe: Timeframe, now_ms: i64) -> Vec<Bar> {
    bars.iter()
        .filter(|b| is_candle_closed(b.timestamp_ms, timeframe, now_ms))
        .cloned()
        .collect()
}

/// Open timestamp of the candle containing `ts_ms`
pub fn floor_to_candle(ts_ms: i64, timeframe: Timeframe) -> i64 {
    let dur = timeframe.duration_ms();
    ts_ms - ts_ms.rem_euclid(dur)
}

/// Minute-of-day in UTC for session classification
pub fn minute_of_day_utc(ts: DateTime<Utc>) -> u32 {
    ts.hour() * 60 + ts.minute()
}

/// The most recent NY close at or before `now`. Keeps the Asia session,
/// which crosses 00:00 UTC, inside a single trading day.
pub fn trading_day_anchor(now: DateTime<Utc>) -> DateTime<Utc> {
    let today_anchor = Utc
        .with_ymd_and_hms(
            now.date_naive().year(),
            now.date_naive().month(),
            now.date_naive().day(),
            TRADING_DAY_ANCHOR_HOUR,
            0,
            0,
        )
        .single()
        .expect("valid anchor timestamp");

    if now >= today_anchor {
        today_anchor
    } else {
        today_anchor - Duration::days(1)
    }
}

/// Parse "HH:MM" or "HH:MM:SS" clock strings from config
pub fn parse_clock(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}
