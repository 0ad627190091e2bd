//! Service-day time handling.
//!
//! Schedule times are seconds since the start of the service day, which is
//! noon minus twelve hours in the feed's time zone. Overnight trips have
//! times past `24:00:00`, and a service day on a DST change is 23 or 25
//! hours long, so wall-clock timestamps must go through
//! [`seconds_since_start_of_service`] rather than naive midnight arithmetic.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;

/// Number of seconds in a nominal service day.
pub const SECONDS_PER_DAY: i32 = 86_400;

/// Error returned when parsing an invalid service time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Parse an `HH:MM:SS` service time into seconds since start of service.
///
/// Hours may exceed 23 for trips running past midnight.
///
/// # Examples
///
/// ```
/// use timetable_updater::domain::parse_service_time;
///
/// assert_eq!(parse_service_time("10:30:00").unwrap(), 37_800);
/// assert_eq!(parse_service_time("25:10:00").unwrap(), 90_600);
/// assert!(parse_service_time("10:30").is_err());
/// assert!(parse_service_time("10:60:00").is_err());
/// ```
pub fn parse_service_time(s: &str) -> Result<i32, TimeError> {
    let mut parts = s.split(':');
    let (Some(h), Some(m), Some(sec), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TimeError::new("expected HH:MM:SS format"));
    };

    let field = |p: &str| -> Result<i32, TimeError> {
        if p.is_empty() || p.len() > 3 || !p.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimeError::new("expected numeric fields"));
        }
        p.parse::<i32>()
            .map_err(|_| TimeError::new("expected numeric fields"))
    };

    let (h, m, sec) = (field(h)?, field(m)?, field(sec)?);
    if m >= 60 || sec >= 60 {
        return Err(TimeError::new("minutes and seconds must be below 60"));
    }
    Ok(h * 3600 + m * 60 + sec)
}

/// Format seconds since start of service as `HH:MM:SS`.
///
/// # Examples
///
/// ```
/// use timetable_updater::domain::format_service_time;
///
/// assert_eq!(format_service_time(37_800), "10:30:00");
/// assert_eq!(format_service_time(90_600), "25:10:00");
/// assert_eq!(format_service_time(-60), "-00:01:00");
/// ```
pub fn format_service_time(seconds: i32) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let s = seconds.unsigned_abs();
    format!("{sign}{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60)
}

/// The instant a service day starts: noon minus twelve hours, local time.
///
/// Falls back to UTC noon if local noon does not exist in `tz`, which no
/// real zone does.
pub fn start_of_service(date: NaiveDate, tz: Tz) -> DateTime<Tz> {
    let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default());
    let local_noon = tz
        .from_local_datetime(&noon)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&noon));
    local_noon - Duration::hours(12)
}

/// Seconds between the start of `service_date` and `instant`.
///
/// # Examples
///
/// ```
/// use chrono::{DateTime, NaiveDate};
/// use timetable_updater::domain::seconds_since_start_of_service;
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
/// let instant = DateTime::parse_from_rfc3339("2024-03-16T00:30:00+01:00").unwrap();
/// let secs = seconds_since_start_of_service(instant, date, chrono_tz::Europe::Oslo);
/// assert_eq!(secs, 24 * 3600 + 1800);
/// ```
pub fn seconds_since_start_of_service(
    instant: DateTime<FixedOffset>,
    service_date: NaiveDate,
    tz: Tz,
) -> i32 {
    let start = start_of_service(service_date, tz);
    let secs = instant.signed_duration_since(start).num_seconds();
    secs.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Whole service days contained in a scheduled time, rounding down.
///
/// A trip whose first departure is `25:00:00` has day offset 1: its
/// service date is the calendar day before the departure's wall-clock day.
pub fn day_offset(seconds: i32) -> i64 {
    seconds.div_euclid(SECONDS_PER_DAY) as i64
}
