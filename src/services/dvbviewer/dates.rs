//! Backend date and time encodings
//!
//! The recording service works in its own local time. Requests carry Delphi dates
//! (whole days since 1899-12-30, time of day as a fraction of 1440 minutes), responses
//! use `dd.MM.yyyy` + `HH:mm:ss` for timers and `yyyyMMddHHmmss` for guide entries.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

const PROGRAM_TIME_FORMAT: &str = "%Y%m%d%H%M%S";
const SCHEDULE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

fn delphi_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

/// Whole days since 1899-12-30
pub fn delphi_date(date: NaiveDate) -> i64 {
    (date - delphi_epoch()).num_days()
}

/// Fractional day with 8 decimals, without the leading "0."
pub fn delphi_time(time: NaiveTime) -> String {
    let minutes = time.hour() * 60 + time.minute();
    let fraction = format!("{:.8}", minutes as f64 / 1440.0);
    fraction
        .strip_prefix("0.")
        .map(String::from)
        .unwrap_or(fraction)
}

/// "{days}.{fraction}" in backend-local time, as used by `api/epg.html`
pub fn delphi_float(instant: DateTime<Utc>, tz: Tz) -> String {
    let local = instant.with_timezone(&tz);
    format!(
        "{}.{}",
        delphi_date(local.date_naive()),
        delphi_time(local.time())
    )
}

/// Days value for `dor=` parameters
pub fn delphi_day(instant: DateTime<Utc>, tz: Tz) -> i64 {
    delphi_date(instant.with_timezone(&tz).date_naive())
}

/// Minutes after local midnight, as used by `start=`/`stop=` parameters
pub fn minutes_of_day(instant: DateTime<Utc>, tz: Tz) -> u32 {
    let local = instant.with_timezone(&tz);
    local.hour() * 60 + local.minute()
}

fn to_utc(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Timer `Date` + `Start` attributes
pub fn parse_schedule_time(date: &str, time: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(
        &format!("{} {}", date.trim(), time.trim()),
        SCHEDULE_FORMAT,
    )
    .ok()?;
    to_utc(naive, tz)
}

/// Guide and recording `start`/`stop` attributes
pub fn parse_program_time(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), PROGRAM_TIME_FORMAT).ok()?;
    to_utc(naive, tz)
}

pub fn format_program_time(instant: DateTime<Utc>, tz: Tz) -> String {
    instant
        .with_timezone(&tz)
        .format(PROGRAM_TIME_FORMAT)
        .to_string()
}

/// Recording `duration` attribute, "HHmmss"
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.len() != 6 || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i64 = value[0..2].parse().ok()?;
    let minutes: i64 = value[2..4].parse().ok()?;
    let seconds: i64 = value[4..6].parse().ok()?;
    Some(Duration::seconds(hours * 3600 + minutes * 60 + seconds))
}

/// Search `StartTime`/`EndTime`, "HH:mm"
pub fn parse_window_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

pub fn format_window_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}
