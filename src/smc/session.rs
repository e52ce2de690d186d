/// Trading-session engine: classifies UTC minutes into named sessions
/// and aggregates closed M15 bars into session snapshots
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Bar;
use crate::utils::time::{minute_of_day_utc, trading_day_anchor};

const M15_MS: i64 = 15 * 60 * 1000;

/// Session windows in UTC minutes of day:
/// ASIA wraps midnight (1380..420), LONDON 420..720, NY 720..1260,
/// everything else is OFF_SESSION
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    Asia,
    London,
    NewYork,
    OffSession,
}

impl SessionType {
    pub fn as_str(&self) -> &str {
        match self {
            SessionType::Asia => "ASIA",
            SessionType::London => "LONDON",
            SessionType::NewYork => "NY",
            SessionType::OffSession => "OFF_SESSION",
        }
    }

    pub fn is_named(&self) -> bool {
        !matches!(self, SessionType::OffSession)
    }
}

pub fn classify_minute(minute: u32) -> SessionType {
    if minute >= 1380 || minute < 420 {
        SessionType::Asia
    } else if minute < 720 {
        SessionType::London
    } else if minute < 1260 {
        SessionType::NewYork
    } else {
        SessionType::OffSession
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_type: SessionType,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub close: f64,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub is_complete: bool,
    pub candle_count: usize,
}

impl SessionSnapshot {
    fn from_bar(session_type: SessionType, bar: &Bar) -> Self {
        SessionSnapshot {
            session_type,
            high: bar.high,
            low: bar.low,
            open: bar.open,
            close: bar.close,
            start_time_ms: bar.timestamp_ms,
            end_time_ms: bar.timestamp_ms + M15_MS,
            is_complete: false,
            candle_count: 1,
        }
    }

    fn absorb(&mut self, bar: &Bar) {
        self.high = self.high.max(bar.high);
        self.low = self.low.min(bar.low);
        self.close = bar.close;
        self.end_time_ms = bar.timestamp_ms + M15_MS;
        self.candle_count += 1;
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Per-symbol session state. Only closed M15 bars may be fed in; the
/// caller owns the closed-candle gate.
pub struct SessionTracker {
    current: Option<SessionSnapshot>,
    previous: Option<SessionSnapshot>,
    last_bar_ms: i64,
}

impl SessionTracker {
    pub fn new() -> Self {
        SessionTracker {
            current: None,
            previous: None,
            last_bar_ms: 0,
        }
    }

    pub fn current(&self) -> Option<&SessionSnapshot> {
        self.current.as_ref()
    }

    /// Last completed named session
    pub fn previous(&self) -> Option<&SessionSnapshot> {
        self.previous.as_ref()
    }

    /// Feed one closed M15 bar. Returns true when a session rollover
    /// occurred (the previous snapshot was finalized).
    pub fn update(&mut self, bar: &Bar) -> bool {
        if bar.timestamp_ms <= self.last_bar_ms {
            return false;
        }
        self.last_bar_ms = bar.timestamp_ms;

        let session_type = classify_minute(minute_of_day_utc(bar.timestamp()));

        match self.current.take() {
            Some(mut current) if current.session_type == session_type => {
                current.absorb(bar);
                self.current = Some(current);
                false
            }
            Some(mut finished) => {
                finished.is_complete = true;
                debug!(
                    "Session {} complete: H {:.5} L {:.5} ({} candles)",
                    finished.session_type.as_str(),
                    finished.high,
                    finished.low,
                    finished.candle_count
                );
                // OFF_SESSION never becomes the reference session
                if finished.session_type.is_named() {
                    self.previous = Some(finished);
                }
                self.current = Some(SessionSnapshot::from_bar(session_type, bar));
                true
            }
            None => {
                self.current = Some(SessionSnapshot::from_bar(session_type, bar));
                false
            }
        }
    }

    /// Deterministic boot: derive the last completed named session
    /// window from the clock alone, then fill its levels from M15
    /// history. Without covering bars the previous session stays unset.
    pub fn bootstrap(&mut self, m15: &[Bar], now: DateTime<Utc>) {
        if self.previous.is_some() {
            return;
        }

        let Some((session_type, start_ms, end_ms)) = last_completed_window(now) else {
            return;
        };

        let in_window: Vec<&Bar> = m15
            .iter()
            .filter(|b| b.timestamp_ms >= start_ms && b.timestamp_ms < end_ms)
            .collect();
        let Some(first) = in_window.first() else {
            debug!(
                "No M15 history covering boot session {} window",
                session_type.as_str()
            );
            return;
        };

        let mut snapshot = SessionSnapshot {
            session_type,
            high: first.high,
            low: first.low,
            open: first.open,
            close: first.close,
            start_time_ms: start_ms,
            end_time_ms: end_ms,
            is_complete: true,
            candle_count: in_window.len(),
        };
        for bar in &in_window[1..] {
            snapshot.high = snapshot.high.max(bar.high);
            snapshot.low = snapshot.low.min(bar.low);
            snapshot.close = bar.close;
        }

        debug!(
            "Booted previous session {}: H {:.5} L {:.5} ({} candles)",
            session_type.as_str(),
            snapshot.high,
            snapshot.low,
            snapshot.candle_count
        );
        self.previous = Some(snapshot);
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// The most recent named session window that ended at or before `now`
fn last_completed_window(now: DateTime<Utc>) -> Option<(SessionType, i64, i64)> {
    let date = now.date_naive();
    let day_start = Utc
        .with_ymd_and_hms(date.year(), date.month(), date.day(), 0, 0, 0)
        .single()?;

    // Candidate windows for today and the two previous days, newest last
    let mut windows: Vec<(SessionType, i64, i64)> = Vec::new();
    for days_back in (0..3).rev() {
        let base = day_start - Duration::days(days_back);
        let base_ms = base.timestamp_millis();
        let minute = |m: i64| base_ms + m * 60_000;
        // Asia runs from 23:00 of the prior day to 07:00
        windows.push((SessionType::Asia, minute(-60), minute(420)));
        windows.push((SessionType::London, minute(420), minute(720)));
        windows.push((SessionType::NewYork, minute(720), minute(1260)));
    }

    let now_ms = now.timestamp_millis();
    windows
        .into_iter()
        .filter(|(_, _, end)| *end <= now_ms)
        .max_by_key(|(_, _, end)| *end)
}

/// High/low of the trading day preceding the current NY-close anchor
#[derive(Debug, Clone, Copy)]
pub struct DayLevels {
    pub high: f64,
    pub low: f64,
    pub anchor_ms: i64,
}

pub fn previous_day_levels(m15: &[Bar], now: DateTime<Utc>) -> Option<DayLevels> {
    let anchor = trading_day_anchor(now);
    let anchor_ms = anchor.timestamp_millis();
    let window_start = anchor_ms - 24 * 3600 * 1000;

    let mut high = f64::MIN;
    let mut low = f64::MAX;
    let mut seen = false;
    for bar in m15 {
        if bar.timestamp_ms >= window_start && bar.timestamp_ms < anchor_ms {
            high = high.max(bar.high);
            low = low.min(bar.low);
            seen = true;
        }
    }
    if seen {
        Some(DayLevels {
            high,
            low,
            anchor_ms,
        })
    } else {
        None
    }
}
