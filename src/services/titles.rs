//! Season, episode and production year pulled out of guide texts
//!
//! The backend rarely sends structured episode data, so it is recovered from the
//! subtitle. Nothing here fails: a text without a token simply yields `None`.

use lazy_static::lazy_static;
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::Mutex;

lazy_static! {
    // "S02E05", "2x05", "(s2.5)" as a standalone token
    static ref EPISODE_TOKEN: Regex =
        Regex::new(r"(?i)(?:^|\s)(\(?s?(\d{1,4})[ex.](\d{1,4})\)?)(?:\s|$)").unwrap();
    static ref YEAR_TOKEN: Regex = Regex::new(r"[\(\[](\d{4})[\)\]]").unwrap();
    static ref LEADING_SEPARATORS: Regex = Regex::new(r"^[\s\-:,.|/]+").unwrap();
    static ref MULTI_SPACES: Regex = Regex::new(r"\s+").unwrap();
    // "Tatort (2019)", "Doctor Who (2005)"
    static ref SERIES_SUFFIX: Regex = Regex::new(r"\s*[\(\[][^\)\]]*\d[^\)\]]*[\)\]]\s*$").unwrap();

    static ref EPISODE_CACHE: Mutex<LruCache<String, EpisodeInfo>> =
        Mutex::new(LruCache::new(NonZeroUsize::new(4096).unwrap()));
}

/// Episode metadata found in a subtitle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeInfo {
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Subtitle with the token removed; None when nothing is left
    pub clean_subtitle: Option<String>,
}

impl EpisodeInfo {
    pub fn has_episode(&self) -> bool {
        self.episode.is_some()
    }
}

fn tidy(text: &str) -> Option<String> {
    let text = LEADING_SEPARATORS.replace(text, "");
    let text = MULTI_SPACES.replace_all(&text, " ");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn parse_episode(subtitle: &str) -> EpisodeInfo {
    let Some(caps) = EPISODE_TOKEN.captures(subtitle) else {
        return EpisodeInfo {
            season: None,
            episode: None,
            clean_subtitle: tidy(subtitle),
        };
    };

    let token = caps.get(1).map(|m| m.range()).unwrap_or(0..0);
    let mut clean = String::with_capacity(subtitle.len());
    clean.push_str(&subtitle[..token.start]);
    clean.push(' ');
    clean.push_str(&subtitle[token.end..]);

    EpisodeInfo {
        season: caps.get(2).and_then(|m| m.as_str().parse().ok()),
        episode: caps.get(3).and_then(|m| m.as_str().parse().ok()),
        clean_subtitle: tidy(&clean),
    }
}

/// Season/episode token in `subtitle`, memoised
pub fn extract_episode(subtitle: &str) -> EpisodeInfo {
    {
        let mut cache = EPISODE_CACHE.lock().unwrap();
        if let Some(cached) = cache.get(subtitle) {
            return cached.clone();
        }
    }

    let info = parse_episode(subtitle);
    EPISODE_CACHE
        .lock()
        .unwrap()
        .put(subtitle.to_string(), info.clone());
    info
}

/// Four digit year in brackets, title first
pub fn extract_year(title: &str, subtitle: Option<&str>) -> Option<i32> {
    let find = |text: &str| {
        YEAR_TOKEN
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    };
    find(title).or_else(|| subtitle.and_then(find))
}

pub fn strip_year(text: &str) -> String {
    tidy(&YEAR_TOKEN.replace_all(text, " ")).unwrap_or_default()
}

/// Series name without a trailing "(2019)"-style qualifier, for name comparisons
pub fn strip_series_suffix(name: &str) -> String {
    SERIES_SUFFIX.replace(name.trim(), "").trim().to_string()
}
