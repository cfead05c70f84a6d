//! Human-friendly date labels.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Label a forecast day relative to `today`: "Today", "Tomorrow", or "Mar 9".
#[must_use]
pub fn format_forecast_date(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if today.succ_opt() == Some(date) {
        "Tomorrow".to_string()
    } else {
        date.format("%b %-d").to_string()
    }
}

/// Label a provider date string (`YYYY-MM-DD`) as seen from `now` in `tz`.
///
/// Unparseable input is returned unchanged.
#[must_use]
pub fn forecast_label(date: &str, tz: Tz, now: DateTime<Utc>) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_or_else(
        |_| date.to_string(),
        |parsed| format_forecast_date(parsed, now.with_timezone(&tz).date_naive()),
    )
}

/// Relative phrase for `then` as seen from `now`, e.g. "5 minutes ago".
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn time_from_now(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let secs = delta.num_seconds().unsigned_abs() as f64;
    let round = |value: f64| value.round() as u64;

    let minutes = round(secs / 60.0);
    let hours = round(secs / 3_600.0);
    let days = round(secs / 86_400.0);
    let months = round(secs / 86_400.0 / 30.44);

    let phrase = if secs < 45.0 {
        "a few seconds".to_string()
    } else if secs < 90.0 {
        "a minute".to_string()
    } else if minutes < 45 {
        format!("{minutes} minutes")
    } else if minutes < 90 {
        "an hour".to_string()
    } else if hours < 22 {
        format!("{hours} hours")
    } else if hours < 36 {
        "a day".to_string()
    } else if days < 26 {
        format!("{days} days")
    } else if days < 46 {
        "a month".to_string()
    } else if months < 11 {
        format!("{months} months")
    } else if months < 18 {
        "a year".to_string()
    } else {
        format!("{} years", round(months as f64 / 12.0))
    };

    if delta.num_seconds() < 0 {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_forecast_labels() {
        let today = day(2024, 12, 31);
        assert_eq!(format_forecast_date(today, today), "Today");
        assert_eq!(format_forecast_date(day(2025, 1, 1), today), "Tomorrow");
        assert_eq!(format_forecast_date(day(2025, 1, 2), today), "Jan 2");
        assert_eq!(format_forecast_date(day(2024, 12, 30), today), "Dec 30");
    }

    #[test]
    fn test_label_uses_timezone() {
        // 03:00 UTC on Mar 10 is still Mar 9 in New York.
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 3, 0, 0).unwrap();
        assert_eq!(
            forecast_label("2024-03-09", chrono_tz::America::New_York, now),
            "Today"
        );
        assert_eq!(forecast_label("2024-03-09", chrono_tz::UTC, now), "Mar 9");
    }

    #[test]
    fn test_unparseable_label_passes_through() {
        assert_eq!(forecast_label("soon", chrono_tz::UTC, Utc::now()), "soon");
    }

    #[test]
    fn test_time_from_now_phrases() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let ago = |d: Duration| time_from_now(now - d, now);

        assert_eq!(ago(Duration::seconds(10)), "a few seconds ago");
        assert_eq!(ago(Duration::seconds(60)), "a minute ago");
        assert_eq!(ago(Duration::minutes(5)), "5 minutes ago");
        assert_eq!(ago(Duration::minutes(60)), "an hour ago");
        assert_eq!(ago(Duration::hours(3)), "3 hours ago");
        assert_eq!(ago(Duration::hours(30)), "a day ago");
        assert_eq!(ago(Duration::days(4)), "4 days ago");
        assert_eq!(ago(Duration::days(40)), "a month ago");
        assert_eq!(ago(Duration::days(120)), "4 months ago");
        assert_eq!(ago(Duration::days(400)), "a year ago");
        assert_eq!(ago(Duration::days(1100)), "3 years ago");
    }

    #[test]
    fn test_time_from_now_future() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(time_from_now(now + Duration::minutes(10), now), "in 10 minutes");
    }
}
