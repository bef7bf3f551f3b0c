use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Whole days from `now` until the start (00:00 UTC) of `expiration`,
/// rounded up, so an expiration later today counts as 0 and yesterday as -1.
pub fn days_until(expiration: NaiveDate, now: DateTime<Utc>) -> i64 {
    let diff_ms = (start_of_day(expiration) - now).num_milliseconds();
    let days = diff_ms / MILLIS_PER_DAY;
    if diff_ms % MILLIS_PER_DAY > 0 {
        days + 1
    } else {
        days
    }
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

pub fn format_days_remaining(days: i64) -> String {
    match days {
        d if d < 0 => "Expired".to_string(),
        0 => "Expires today".to_string(),
        1 => "1 day remaining".to_string(),
        d => format!("{} days remaining", d),
    }
}

/// Short month/year label used to bucket practices, e.g. "Oct 26".
pub fn month_label(date: DateTime<Utc>) -> String {
    date.format("%b %y").to_string()
}

pub fn format_date(date: DateTime<Utc>) -> String {
    date.format("%-d %b %Y").to_string()
}

pub fn first_name(full_name: &str) -> &str {
    full_name.split_whitespace().next().unwrap_or("")
}

/// Accepts RFC 3339, a `datetime-local` form value (`2026-10-20T18:30`),
/// or a bare date; values without an offset are taken as UTC.
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid date: {}", input))?;
    Ok(start_of_day(date))
}

pub fn deserialize_datetime<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_datetime(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_until_rounds_up() {
        let now = at(2026, 10, 19, 10);
        assert_eq!(days_until(date(2026, 10, 19), now), 0);
        assert_eq!(days_until(date(2026, 10, 20), now), 1);
        assert_eq!(days_until(date(2026, 10, 18), now), -1);
        assert_eq!(days_until(date(2026, 11, 18), now), 30);
        assert_eq!(days_until(date(2026, 11, 19), now), 31);
    }

    #[test]
    fn test_days_until_at_midnight() {
        let now = at(2026, 10, 19, 0);
        assert_eq!(days_until(date(2026, 10, 19), now), 0);
        assert_eq!(days_until(date(2026, 10, 20), now), 1);
        assert_eq!(days_until(date(2026, 10, 18), now), -1);
        assert_eq!(
            days_until(date(2026, 10, 18), now + Duration::milliseconds(1)),
            -1
        );
    }

    #[test]
    fn test_format_days_remaining() {
        assert_eq!(format_days_remaining(-3), "Expired");
        assert_eq!(format_days_remaining(0), "Expires today");
        assert_eq!(format_days_remaining(1), "1 day remaining");
        assert_eq!(format_days_remaining(30), "30 days remaining");
    }

    #[test]
    fn test_month_label_and_first_name() {
        assert_eq!(month_label(at(2026, 10, 3, 18)), "Oct 26");
        assert_eq!(first_name("Lucía Fernández Ortega"), "Lucía");
        assert_eq!(first_name(""), "");
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert_eq!(
            parse_datetime("2026-10-20T18:30").unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 20, 18, 30, 0).unwrap()
        );
        assert_eq!(
            parse_datetime("2026-10-20T18:30:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 20, 16, 30, 0).unwrap()
        );
        assert_eq!(parse_datetime("2026-10-20").unwrap(), at(2026, 10, 20, 0));
        assert!(parse_datetime("next tuesday").is_err());
    }
}
