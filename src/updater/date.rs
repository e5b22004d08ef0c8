//! Conversions between chrono timestamps and spreadsheet date cells.
//!
//! Workbooks use the 1900 date system: a cell stores fractional days since
//! 1899-12-30. Serials are read and written on the UTC wall clock.

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

const TEXT_FORMATS: [&str; 4] = [
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

const TEXT_DATE_FORMATS: [&str; 3] = ["%d.%m.%Y", "%d/%m/%Y", "%Y-%m-%d"];

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Current time on the clock the workbooks are kept in.
pub fn now_utc() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn to_excel_serial(value: NaiveDateTime) -> f64 {
    let elapsed = value - epoch();
    elapsed.num_milliseconds() as f64 / MILLIS_PER_DAY
}

pub fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let millis = (serial * MILLIS_PER_DAY).round() as i64;
    epoch().checked_add_signed(Duration::milliseconds(millis))
}

/// Parses a date cell that was typed in as text rather than as a serial.
pub fn parse_text_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TEXT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            TEXT_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Whole hours elapsed from `last` to `now`, rounded down.
pub fn hours_between(last: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (now - last).num_minutes().div_euclid(60)
}
