//! Polling interval parsing and formatting

use serde_json::Value;
use std::time::Duration;

use crate::{FALLBACK_SCAN_INTERVAL_SECS, MAX_SCAN_INTERVAL_SECS, MIN_SCAN_INTERVAL_SECS};

/// Parse a configured scan interval.
///
/// Numbers are seconds; strings are handled by [`parse_interval_str`].
/// Anything else falls back to ten minutes. The result is kept between the
/// minimum and maximum polling intervals.
pub fn parse_interval_value(value: &Value) -> Duration {
    let secs = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(FALLBACK_SCAN_INTERVAL_SECS),
        Value::String(s) => return parse_interval_str(s),
        _ => FALLBACK_SCAN_INTERVAL_SECS,
    };
    clamp(secs)
}

/// Parse `"90"`, `"90.5"` or `"HH:MM:SS"`; empty or invalid input yields ten minutes
pub fn parse_interval_str(s: &str) -> Duration {
    let s = s.trim();
    if s.is_empty() {
        return clamp(FALLBACK_SCAN_INTERVAL_SECS);
    }

    if s.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(secs) = s.parse::<u64>() {
            return clamp(secs);
        }
    }

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() == 3 {
        let parsed: Result<Vec<u64>, _> = parts.iter().map(|p| p.trim().parse::<u64>()).collect();
        if let Ok(p) = parsed {
            let secs = p[0]
                .checked_mul(3600)
                .and_then(|h| p[1].checked_mul(60).and_then(|m| h.checked_add(m)))
                .and_then(|hm| hm.checked_add(p[2]))
                .unwrap_or(MAX_SCAN_INTERVAL_SECS);
            return clamp(secs);
        }
    }

    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => clamp(f as u64),
        _ => clamp(FALLBACK_SCAN_INTERVAL_SECS),
    }
}

fn clamp(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(MIN_SCAN_INTERVAL_SECS, MAX_SCAN_INTERVAL_SECS))
}

/// Keep an interval between the minimum and maximum polling intervals
pub fn clamp_interval(interval: Duration) -> Duration {
    clamp(interval.as_secs())
}

/// Format as `HH:MM:SS`, the form stored in config entries
pub fn format_hms(interval: Duration) -> String {
    let secs = interval.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Format for display, e.g. `"2 minutes 30 seconds"` or `"1 hours"`
pub fn format_human(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs < 60 {
        format!("{} seconds", secs)
    } else if secs < 3600 {
        let (minutes, rest) = (secs / 60, secs % 60);
        if rest > 0 {
            format!("{} minutes {} seconds", minutes, rest)
        } else {
            format!("{} minutes", minutes)
        }
    } else {
        let (hours, minutes) = (secs / 3600, (secs % 3600) / 60);
        if minutes > 0 {
            format!("{} hours {} minutes", hours, minutes)
        } else {
            format!("{} hours", hours)
        }
    }
}
