//! Timestamp helpers.
//!
//! The upstream server keys everything by integer seconds since the Unix
//! epoch (UTC) and lays files out under `{YYYY-MM-DD}/{HHMM}` paths; the
//! helpers here convert between the two. Functions that filter by recency
//! take `now` explicitly so callers (and tests) control the reference
//! point.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Formats a timestamp as the upstream `(date, time)` path pair,
/// e.g. `("2026-08-07", "0130")`.
///
/// Returns `None` for timestamps outside chrono's representable range.
pub fn date_time_parts(timestamp: i64) -> Option<(String, String)> {
    let dt = DateTime::<Utc>::from_timestamp(timestamp, 0)?;
    Some((
        dt.format("%Y-%m-%d").to_string(),
        dt.format("%H%M").to_string(),
    ))
}

/// Parses an upstream `(date, time)` path pair back to a UTC timestamp.
pub fn parse_date_time(date: &str, time: &str) -> Option<i64> {
    let dt = NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H%M").ok()?;
    Some(dt.and_utc().timestamp())
}

/// Whether `timestamp` falls within the trailing `hours` window ending at
/// `now`. `hours == 0` means unlimited: everything passes.
pub fn within_trailing_window(timestamp: i64, hours: u32, now: DateTime<Utc>) -> bool {
    hours == 0 || now.timestamp() - timestamp <= i64::from(hours) * 3600
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_time_parts() {
        // 2021-03-01 01:30:00 UTC
        let (date, time) = date_time_parts(1614562200).unwrap();
        assert_eq!(date, "2021-03-01");
        assert_eq!(time, "0130");
    }

    #[test]
    fn test_parse_round_trip() {
        let ts = 1614562200;
        let (date, time) = date_time_parts(ts).unwrap();
        assert_eq!(parse_date_time(&date, &time), Some(ts));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_date_time("2021-03-01", "25xx"), None);
        assert_eq!(parse_date_time("not-a-date", "0130"), None);
    }

    #[test]
    fn test_seconds_below_minute_are_dropped() {
        // 01:30:45 formats to 0130 and parses back to 01:30:00.
        let ts = 1614562245;
        let (date, time) = date_time_parts(ts).unwrap();
        assert_eq!(parse_date_time(&date, &time), Some(ts - 45));
    }

    #[test]
    fn test_trailing_window() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let two_hours_ago = now.timestamp() - 2 * 3600;
        let three_hours_ago = now.timestamp() - 3 * 3600;

        assert!(within_trailing_window(two_hours_ago, 2, now));
        assert!(!within_trailing_window(three_hours_ago, 2, now));
        // Zero disables the filter entirely.
        assert!(within_trailing_window(three_hours_ago, 0, now));
        // Future timestamps always pass a non-zero window.
        assert!(within_trailing_window(now.timestamp() + 60, 1, now));
    }

    #[test]
    fn test_out_of_range_timestamp() {
        assert!(date_time_parts(i64::MAX).is_none());
    }
}
