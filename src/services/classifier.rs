use lazy_static::lazy_static;
use regex::Regex;

use crate::config::{GenreConfig, GenreMode};
use crate::models::Classification;

lazy_static! {
    static ref LABEL_PREFIX: Regex = Regex::new(r"^[\W_]+").unwrap();
    static ref LABEL_SUFFIX: Regex = Regex::new(r"\s*\([^)]*\)\s*$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Movie,
    Series,
    Sport,
    News,
    Kids,
    Live,
}

impl Bucket {
    const ALL: [Bucket; 6] = [
        Bucket::Movie,
        Bucket::Series,
        Bucket::Sport,
        Bucket::News,
        Bucket::Kids,
        Bucket::Live,
    ];

    fn coded_label(&self) -> &'static str {
        match self {
            Bucket::Movie => "Movie",
            Bucket::Series => "Series",
            Bucket::Sport => "Sports",
            Bucket::News => "News",
            Bucket::Kids => "Children",
            Bucket::Live => "Live",
        }
    }
}

/// Maps a content signal to genre flags and display labels
pub struct GenreClassifier {
    config: GenreConfig,
}

impl GenreClassifier {
    pub fn new(config: GenreConfig) -> Self {
        Self { config }
    }

    pub fn mode(&self) -> GenreMode {
        self.config.mode
    }

    fn entries(&self, bucket: Bucket) -> &[String] {
        match bucket {
            Bucket::Movie => &self.config.movie,
            Bucket::Series => &self.config.series,
            Bucket::Sport => &self.config.sport,
            Bucket::News => &self.config.news,
            Bucket::Kids => &self.config.kids,
            Bucket::Live => &self.config.live,
        }
    }

    /// Label for `bucket` when the signal matches it
    fn test(&self, bucket: Bucket, code: Option<&str>, overview: Option<&str>) -> Option<String> {
        match self.config.mode {
            GenreMode::Coded => {
                let code = code?.trim();
                self.entries(bucket)
                    .iter()
                    .any(|c| c.trim() == code)
                    .then(|| bucket.coded_label().to_string())
            }
            GenreMode::Text => {
                let overview = overview?;
                let keyword = if self.config.case_sensitive {
                    self.entries(bucket)
                        .iter()
                        .find(|k| !k.is_empty() && overview.contains(k.as_str()))
                } else {
                    let lowered = overview.to_lowercase();
                    self.entries(bucket)
                        .iter()
                        .find(|k| !k.is_empty() && lowered.contains(&k.to_lowercase()))
                }?;
                Some(keyword_label(keyword))
            }
        }
    }

    /// Classify a program, timer or recording.
    ///
    /// `code` is the EIT content code, `overview` the description text; which one is
    /// read depends on the configured mode. `has_episode` vetoes the movie flag.
    pub fn classify(
        &self,
        code: Option<&str>,
        overview: Option<&str>,
        has_episode: bool,
    ) -> Classification {
        let mut result = Classification::default();
        let mut series_hit = false;
        let mut movie_hit = false;

        for bucket in Bucket::ALL {
            let Some(label) = self.test(bucket, code, overview) else {
                continue;
            };

            match bucket {
                Bucket::Movie if has_episode => continue,
                Bucket::Movie => movie_hit = true,
                Bucket::Series => series_hit = true,
                Bucket::Sport => result.is_sports = true,
                Bucket::News => result.is_news = true,
                Bucket::Kids => result.is_kids = true,
                Bucket::Live => result.is_live = true,
            }
            if !result.genres.contains(&label) {
                result.genres.push(label);
            }
        }

        let episodic = result.is_sports || result.is_news || result.is_kids || result.is_live;

        result.is_movie = movie_hit;
        result.is_series = series_hit
            || episodic
            || self.config.series.is_empty()
            || (self.config.mode == GenreMode::Coded && !movie_hit);
        // Legacy heuristic, not a reliable premiere signal
        result.is_premiere = result.is_series;

        result
    }
}

/// "- Spielfilm (DE)" -> "Spielfilm"
fn keyword_label(keyword: &str) -> String {
    let label = LABEL_PREFIX.replace(keyword, "");
    let label = LABEL_SUFFIX.replace(&label, "");
    label.trim().to_string()
}
