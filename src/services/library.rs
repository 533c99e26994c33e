//! Library presence checks used to suppress duplicate recordings

use crate::config::LibraryProfile;
use crate::models::{RecordingRecord, TimerRecord};

use super::titles::strip_series_suffix;

/// Host media library, as far as the matcher needs it
pub trait LibraryLookup: Send + Sync {
    fn has_episode(&self, series: &str, season: u32, episode: u32) -> bool;
    fn has_episode_by_name(&self, series: &str, episode_title: &str) -> bool;
}

fn same_series(a: &str, b: &str) -> bool {
    strip_series_suffix(a).eq_ignore_ascii_case(&strip_series_suffix(b))
}

/// Library built from the backend's own recordings
pub struct RecordingsLibrary {
    recordings: Vec<RecordingRecord>,
}

impl RecordingsLibrary {
    pub fn new(recordings: Vec<RecordingRecord>) -> Self {
        Self { recordings }
    }

    fn series_items<'a>(&'a self, series: &'a str) -> impl Iterator<Item = &'a RecordingRecord> {
        self.recordings.iter().filter(move |r| {
            let name = r.series.as_deref().unwrap_or(&r.name);
            same_series(name, series)
        })
    }
}

impl LibraryLookup for RecordingsLibrary {
    fn has_episode(&self, series: &str, season: u32, episode: u32) -> bool {
        self.series_items(series)
            .any(|r| r.season_number == Some(season) && r.episode_number == Some(episode))
    }

    fn has_episode_by_name(&self, series: &str, episode_title: &str) -> bool {
        let wanted = episode_title.trim().to_lowercase();
        if wanted.is_empty() {
            return false;
        }
        self.series_items(series).any(|r| {
            r.episode_title
                .as_deref()
                .map(|t| t.to_lowercase().contains(&wanted))
                .unwrap_or(false)
        })
    }
}

/// Applies the configured matching profile to a timer
#[derive(Debug, Clone, Copy)]
pub struct LibraryMatcher {
    profile: LibraryProfile,
}

impl LibraryMatcher {
    pub fn new(profile: LibraryProfile) -> Self {
        Self { profile }
    }

    pub fn is_in_library(&self, timer: &TimerRecord, library: &dyn LibraryLookup) -> bool {
        match self.profile {
            LibraryProfile::SeasonEpisode => match (timer.season_number, timer.episode_number) {
                (Some(season), Some(episode)) => {
                    library.has_episode(&timer.series_name, season, episode)
                }
                _ => false,
            },
            LibraryProfile::EpisodeName => timer
                .episode_title
                .as_deref()
                .map(|title| library.has_episode_by_name(&timer.series_name, title))
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, RecordingStatus};
    use chrono::Utc;

    fn recording(series: &str, season: u32, episode: u32, title: &str) -> RecordingRecord {
        RecordingRecord {
            id: "1".to_string(),
            name: series.to_string(),
            episode_title: Some(title.to_string()),
            season_number: Some(season),
            episode_number: Some(episode),
            production_year: None,
            overview: None,
            series: Some(series.to_string()),
            channel_id: None,
            channel_name: "ZDF HD".to_string(),
            start_utc: Utc::now(),
            end_utc: Utc::now(),
            path: String::new(),
            image_url: None,
            status: RecordingStatus::Completed,
            classification: Classification::default(),
        }
    }

    fn timer(series: &str, season: Option<u32>, episode: Option<u32>, title: Option<&str>) -> TimerRecord {
        TimerRecord {
            id: "7".to_string(),
            name: series.to_string(),
            series_name: series.to_string(),
            overview: None,
            channel_id: "5".to_string(),
            start_utc: Utc::now(),
            end_utc: Utc::now(),
            pre_padding_sec: 0,
            post_padding_sec: 0,
            series_link_id: Some(series.to_string()),
            program_id: None,
            status: RecordingStatus::New,
            priority: 49,
            episode_title: title.map(String::from),
            season_number: season,
            episode_number: episode,
            genres: Vec::new(),
        }
    }

    fn library() -> RecordingsLibrary {
        RecordingsLibrary::new(vec![recording("Doctor Who (2005)", 2, 5, "The Girl in the Fireplace")])
    }

    #[test]
    fn test_season_episode_profile() {
        let matcher = LibraryMatcher::new(LibraryProfile::SeasonEpisode);
        assert!(matcher.is_in_library(&timer("Doctor Who", Some(2), Some(5), None), &library()));
        assert!(!matcher.is_in_library(&timer("Doctor Who", Some(2), Some(6), None), &library()));
        assert!(!matcher.is_in_library(&timer("Doctor Who", None, None, None), &library()));
    }

    #[test]
    fn test_episode_name_profile() {
        let matcher = LibraryMatcher::new(LibraryProfile::EpisodeName);
        let hit = timer("doctor who", None, None, Some("Girl in the Fireplace"));
        assert!(matcher.is_in_library(&hit, &library()));

        let other_series = timer("Torchwood", None, None, Some("Girl in the Fireplace"));
        assert!(!matcher.is_in_library(&other_series, &library()));
    }
}
