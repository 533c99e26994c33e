use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Normalized timer/recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingStatus {
    New,
    InProgress,
    Completed,
    Cancelled,
    ConflictedNotOk,
}

/// Raw backend timer flags: enabled {0,1}, executable {0,1}, recording {0,-1}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFlags {
    pub enabled: i32,
    pub executable: i32,
    pub recording: i32,
}

impl TimerFlags {
    /// Parse the string flags the timer list carries; unparseable values never trigger a state
    pub fn parse(enabled: Option<&str>, executable: Option<&str>, recording: Option<&str>) -> Self {
        let parse = |v: Option<&str>, default: i32| {
            v.and_then(|s| s.trim().parse::<i32>().ok()).unwrap_or(default)
        };
        Self {
            enabled: parse(enabled, 1),
            executable: parse(executable, 1),
            recording: parse(recording, 0),
        }
    }
}

impl RecordingStatus {
    /// First match wins: disabled, conflicted, recording, otherwise new
    pub fn derive(flags: TimerFlags) -> Self {
        if flags.enabled == 0 {
            RecordingStatus::Cancelled
        } else if flags.executable == 0 {
            RecordingStatus::ConflictedNotOk
        } else if flags.recording == -1 {
            RecordingStatus::InProgress
        } else {
            RecordingStatus::New
        }
    }
}

/// One-time schedule as served to the host
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub id: String,
    pub name: String,
    /// Program name without the episode suffix, used for library matching
    pub series_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    pub channel_id: String,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub pre_padding_sec: u32,
    pub post_padding_sec: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_link_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
    pub status: RecordingStatus,
    pub priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
    pub genres: Vec<String>,
}

/// Recurring backend search
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeriesTimerRecord {
    pub id: String,
    pub name: String,
    /// None means any channel
    pub channel_id: Option<String>,
    /// Both None means any time; backend-local wall clock
    pub start_window: Option<NaiveTime>,
    pub end_window: Option<NaiveTime>,
    pub days: Vec<Weekday>,
    pub days_mask: u8,
    pub pre_padding_sec: u32,
    pub post_padding_sec: u32,
    pub record_new_only: bool,
    pub skip_if_in_library: bool,
    pub priority: i32,
}

/// Priority the backend uses to mark "skip episodes already in the library"
pub const SKIP_IN_LIBRARY_PRIORITY: i32 = 49;
pub const DEFAULT_PRIORITY: i32 = 50;

/// Backend days bitmask: Monday = 1 ... Sunday = 64
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaysMask(pub u8);

impl DaysMask {
    pub const ALL: DaysMask = DaysMask(127);

    const ORDER: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    pub fn weekdays(&self) -> Vec<Weekday> {
        Self::ORDER
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.0 & (1 << bit) != 0)
            .map(|(_, day)| *day)
            .collect()
    }

    /// An empty day list means every day
    pub fn from_weekdays(days: &[Weekday]) -> Self {
        if days.is_empty() {
            return Self::ALL;
        }
        DaysMask(
            days.iter()
                .fold(0u8, |mask, day| mask | (1 << day.num_days_from_monday())),
        )
    }
}

/// Host input for creating or updating a one-time timer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub channel_id: String,
    #[serde(default)]
    pub program_id: Option<String>,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    #[serde(default)]
    pub pre_padding_sec: Option<u32>,
    #[serde(default)]
    pub post_padding_sec: Option<u32>,
}

/// Host input for creating or updating a recurring search
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesTimerSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub start_window: Option<NaiveTime>,
    #[serde(default)]
    pub end_window: Option<NaiveTime>,
    #[serde(default)]
    pub days: Vec<Weekday>,
    #[serde(default)]
    pub pre_padding_sec: Option<u32>,
    #[serde(default)]
    pub post_padding_sec: Option<u32>,
    #[serde(default)]
    pub record_new_only: bool,
    #[serde(default)]
    pub skip_if_in_library: bool,
}

/// Values the host pre-fills when a user starts a new schedule
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerDefaults {
    pub pre_padding_sec: u32,
    pub post_padding_sec: u32,
    pub record_any_channel: bool,
    pub record_any_time: bool,
    pub record_new_only: bool,
    pub skip_if_in_library: bool,
    pub days: Vec<Weekday>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(enabled: i32, executable: i32, recording: i32) -> TimerFlags {
        TimerFlags {
            enabled,
            executable,
            recording,
        }
    }

    #[test]
    fn test_status_precedence_table() {
        use RecordingStatus::*;
        let table = [
            ((0, 0, -1), Cancelled),
            ((0, 0, 0), Cancelled),
            ((0, 1, -1), Cancelled),
            ((0, 1, 0), Cancelled),
            ((1, 0, -1), ConflictedNotOk),
            ((1, 0, 0), ConflictedNotOk),
            ((1, 1, -1), InProgress),
            ((1, 1, 0), New),
        ];

        for ((e, x, r), expected) in table {
            assert_eq!(RecordingStatus::derive(flags(e, x, r)), expected, "flags {e},{x},{r}");
        }
    }

    #[test]
    fn test_flags_parse_backend_strings() {
        let parsed = TimerFlags::parse(Some("-1"), Some("-1"), Some("-1"));
        assert_eq!(RecordingStatus::derive(parsed), RecordingStatus::InProgress);

        let parsed = TimerFlags::parse(None, Some("garbage"), None);
        assert_eq!(RecordingStatus::derive(parsed), RecordingStatus::New);

        let parsed = TimerFlags::parse(Some("0"), None, None);
        assert_eq!(RecordingStatus::derive(parsed), RecordingStatus::Cancelled);
    }

    #[test]
    fn test_days_mask_decode() {
        assert_eq!(DaysMask(127).weekdays().len(), 7);
        assert_eq!(DaysMask(1 | 4 | 64).weekdays(), vec![Weekday::Mon, Weekday::Wed, Weekday::Sun]);
        assert!(DaysMask(0).weekdays().is_empty());
    }

    #[test]
    fn test_days_mask_encode() {
        assert_eq!(DaysMask::from_weekdays(&[Weekday::Sat, Weekday::Sun]), DaysMask(96));
        assert_eq!(DaysMask::from_weekdays(&[]), DaysMask::ALL);
    }
}
