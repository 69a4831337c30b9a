//! Human-relative "time ago" labels.
//!
//! Elapsed time is the difference of two UTC instants, so the label never
//! depends on the local timezone.

use chrono::{DateTime, Utc};

const UNITS: [(i64, &str); 5] = [
    (31_536_000, "year"),
    (86_400, "day"),
    (3_600, "hour"),
    (60, "minute"),
    (1, "second"),
];

/// Label for `elapsed_secs` whole seconds: the largest unit with a non-zero
/// value, or `"now"` under one second (and for negative input, i.e. clock skew).
pub fn format_elapsed(elapsed_secs: i64) -> String {
    let mut remaining = elapsed_secs.max(0);
    for (unit_secs, name) in UNITS {
        let value = remaining / unit_secs;
        if value > 0 {
            let suffix = if value > 1 { "s ago" } else { " ago" };
            return format!("{value} {name}{suffix}");
        }
        remaining %= unit_secs;
    }
    "now".to_string()
}

/// Label for a record created at `created_at`, as seen at `now`.
pub fn readable_period(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format_elapsed((now - created_at).num_seconds())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn boundaries() {
        assert_eq!(format_elapsed(0), "now");
        assert_eq!(format_elapsed(1), "1 second ago");
        assert_eq!(format_elapsed(59), "59 seconds ago");
        assert_eq!(format_elapsed(61), "1 minute ago");
        assert_eq!(format_elapsed(120), "2 minutes ago");
        assert_eq!(format_elapsed(3600), "1 hour ago");
        assert_eq!(format_elapsed(90_000), "1 day ago");
        assert_eq!(format_elapsed(2 * 86_400 + 5), "2 days ago");
        assert_eq!(format_elapsed(31_536_000), "1 year ago");
        assert_eq!(format_elapsed(3 * 31_536_000 + 86_400), "3 years ago");
    }

    #[test]
    fn future_timestamps_are_now() {
        assert_eq!(format_elapsed(-30), "now");
    }

    #[test]
    fn sub_second_elapsed_is_now() {
        let now = Utc::now();
        assert_eq!(readable_period(now - Duration::milliseconds(999), now), "now");
        assert_eq!(readable_period(now - Duration::seconds(61), now), "1 minute ago");
    }
}
