//! Human-readable durations: `"500ms"`, `"2s"`, `"1m"`, or a bare number of seconds.

use std::time::Duration;

/// Parse a duration string.
///
/// Returns `None` if the string cannot be parsed.
///
/// # Examples
///
/// ```
/// use warden::config::parse_duration_string;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration_string("2s"), Some(Duration::from_secs(2)));
/// assert_eq!(parse_duration_string("500ms"), Some(Duration::from_millis(500)));
/// assert_eq!(parse_duration_string("1m"), Some(Duration::from_secs(60)));
/// assert_eq!(parse_duration_string("10"), Some(Duration::from_secs(10)));
/// ```
pub fn parse_duration_string(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        return ms.parse().ok().map(Duration::from_millis);
    }
    if let Some(secs) = s.strip_suffix('s') {
        return secs.parse().ok().map(Duration::from_secs);
    }
    if let Some(mins) = s.strip_suffix('m') {
        return mins
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs);
    }
    s.parse().ok().map(Duration::from_secs)
}

/// Render a duration in the same format, using the largest exact unit.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 60_000 == 0 && millis > 0 {
        format!("{}m", millis / 60_000)
    } else if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}
