//! Best-effort parsing of date and datetime strings.

use crate::logging::log_debug;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// A textual value that could not be read as a date or datetime.
/// Recovered locally by the accessor; never aborts ingestion.
#[derive(Error, Debug, PartialEq)]
pub enum CoercionError {
    #[error("parse '{0}' to datetime failed")]
    Unparseable(String),
}

/// Shapes a date string may start with. Anything else is rejected before chrono runs,
/// so plain numbers and words are never taken for dates.
static DATE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4}[-/]\d{1,2}[-/]\d{1,2}|\d{1,2}/\d{1,2}/\d{4}|\d{1,2} [A-Za-z]{3,9},? \d{4}|[A-Za-z]{3,9} \d{1,2}, \d{4})",
    )
    .expect("Hardcode regex pattern")
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d %B, %Y",
    "%d %b, %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Parses strings into dates and datetimes for date-typed columns.
///
/// Accepts ISO-8601/RFC-3339 datetimes (with or without offset, `T` or space separated),
/// ISO and slash separated dates, US `m/d/Y` dates and spelled-out month names.
/// Offsets are normalized to UTC.
#[derive(Clone, Copy, Debug, Default)]
pub struct DateValidator;

impl DateValidator {
    /// Checks whether a string reads as a date or datetime.
    pub fn is_valid(&self, text: &str) -> bool {
        self.parse(text).is_ok()
    }

    /// Parses a string into a datetime; date-only strings land on midnight.
    pub fn parse(&self, text: &str) -> Result<NaiveDateTime, CoercionError> {
        let text = text.trim();
        if !DATE_PREFIX.is_match(text) {
            return Err(CoercionError::Unparseable(text.to_owned()));
        }
        if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
            return Ok(datetime.naive_utc());
        }
        for format in OFFSET_DATETIME_FORMATS {
            if let Ok(datetime) = DateTime::parse_from_str(text, format) {
                return Ok(datetime.naive_utc());
            }
        }
        for format in DATETIME_FORMATS {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
                return Ok(datetime);
            }
        }
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                return Ok(date.and_time(chrono::NaiveTime::MIN));
            }
        }
        log_debug!(component = "validator", event = "datetime_unparseable", value = %text);
        Err(CoercionError::Unparseable(text.to_owned()))
    }

    /// Parses a string into a date, dropping any time component.
    pub fn parse_date(&self, text: &str) -> Result<NaiveDate, CoercionError> {
        self.parse(text).map(|datetime| datetime.date())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datetime(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, mi, s).unwrap()
    }

    #[test]
    fn parse_iso_variants() {
        let validator = DateValidator;
        assert_eq!(validator.parse("2019-07-11").unwrap(), datetime(2019, 7, 11, 0, 0, 0));
        assert_eq!(validator.parse("2019-07-11T12:30:05").unwrap(), datetime(2019, 7, 11, 12, 30, 5));
        assert_eq!(validator.parse("2019-07-11 12:30:05.250").unwrap().date(), datetime(2019, 7, 11, 0, 0, 0).date());
        assert_eq!(validator.parse("2019-07-11T12:30:05Z").unwrap(), datetime(2019, 7, 11, 12, 30, 5));
        assert_eq!(validator.parse("2019-07-11T12:30:05+02:00").unwrap(), datetime(2019, 7, 11, 10, 30, 5));
        assert_eq!(validator.parse("2019-07-11 12:30").unwrap(), datetime(2019, 7, 11, 12, 30, 0));
    }

    #[test]
    fn parse_other_spellings() {
        let validator = DateValidator;
        assert_eq!(validator.parse("07/11/2019").unwrap(), datetime(2019, 7, 11, 0, 0, 0));
        assert_eq!(validator.parse("2019/07/11").unwrap(), datetime(2019, 7, 11, 0, 0, 0));
        assert_eq!(validator.parse("11 July 2019").unwrap(), datetime(2019, 7, 11, 0, 0, 0));
        assert_eq!(validator.parse("Jul 11, 2019").unwrap(), datetime(2019, 7, 11, 0, 0, 0));
    }

    #[test]
    fn reject_non_dates() {
        let validator = DateValidator;
        for text in ["", "abc", "1", "12345", "true", "2019-13-45", "s1", "1.5"] {
            assert!(!validator.is_valid(text), "{text} should not parse");
        }
        assert_eq!(
            validator.parse("not a date"),
            Err(CoercionError::Unparseable("not a date".to_owned()))
        );
    }

    #[test]
    fn parse_date_drops_time() {
        let validator = DateValidator;
        assert_eq!(
            validator.parse_date("2019-07-11T23:59:59").unwrap(),
            NaiveDate::from_ymd_opt(2019, 7, 11).unwrap()
        );
    }
}
