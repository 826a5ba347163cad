//! strftime-style timestamp parsing

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse `value` with `format`, normalising to UTC.
///
/// Formats carrying an offset (`%z`) are honoured; formats without one are
/// read as UTC. A date-only format yields midnight.
pub fn parse_timestamp(value: &str, format: &str) -> std::result::Result<DateTime<Utc>, String> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_str(value, format) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
        return Ok(naive.and_utc());
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, format) {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(format!(
        "timestamp {:?} does not match format {:?}",
        value, format
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_apache_timestamp_with_offset() {
        let ts = parse_timestamp("10/Oct/2023:13:55:36 +0200", "%d/%b/%Y:%H:%M:%S %z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2023, 10, 10, 11, 55, 36).unwrap());
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        let ts = parse_timestamp("2023-01-05 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2023, 1, 5, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_date_only() {
        let ts = parse_timestamp("2023-01-05", "%Y-%m-%d").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2023, 1, 5, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_mismatch_is_reported() {
        let err = parse_timestamp("yesterday", "%Y-%m-%d %H:%M:%S").unwrap_err();
        assert!(err.contains("yesterday"));
    }
}
