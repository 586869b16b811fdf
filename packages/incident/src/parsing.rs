//! Timestamp parsing for raw incident rows.
//!
//! Source exports are inconsistent about date and time formats, so parsing
//! walks a fallback list of accepted formats. Rows that fail every format are
//! dropped by the loader, never fatal on their own.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y", "%d/%m/%Y"];

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parses a date string against the accepted format list.
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
}

/// Parses a time string against the accepted format list.
#[must_use]
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(s, format).ok())
}

/// Parses separate date and time fields into one timestamp. Also accepts a
/// combined `"date time"` value in either field, since some exports collapse
/// the two columns.
#[must_use]
pub fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    if let (Some(d), Some(t)) = (parse_date(date), parse_time(time)) {
        return Some(d.and_time(t));
    }

    let combined = format!("{} {}", date.trim(), time.trim());
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(combined.trim(), format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(date.trim(), format).ok())
        })
}

/// Parses lat/lng from optional f64 fields. Returns `None` if missing or zero.
#[must_use]
pub fn parse_lat_lng(lat: Option<f64>, lng: Option<f64>) -> Option<(f64, f64)> {
    let latitude = lat?;
    let longitude = lng?;
    if latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    Some((latitude, longitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_date_and_short_time() {
        let ts = parse_timestamp("2024-01-15", "14:30").unwrap();
        assert_eq!(ts.to_string(), "2024-01-15 14:30:00");
    }

    #[test]
    fn parses_us_date_and_full_time() {
        let ts = parse_timestamp("01/15/2024", "14:30:45").unwrap();
        assert_eq!(ts.to_string(), "2024-01-15 14:30:45");
    }

    #[test]
    fn parses_combined_datetime_in_date_field() {
        let ts = parse_timestamp("2024-01-15 14:30", "").unwrap();
        assert_eq!(ts.to_string(), "2024-01-15 14:30:00");
    }

    #[test]
    fn rejects_unparseable_timestamp() {
        assert!(parse_timestamp("not-a-date", "25:99").is_none());
    }

    #[test]
    fn rejects_zero_coordinates() {
        assert!(parse_lat_lng(Some(0.0), Some(73.85)).is_none());
        assert!(parse_lat_lng(Some(18.52), None).is_none());
        assert!(parse_lat_lng(Some(18.52), Some(73.85)).is_some());
    }
}
