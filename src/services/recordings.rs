use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::channels::ChannelCatalog;
use super::classifier::GenreClassifier;
use super::clock::Clock;
use super::dvbviewer::dates::{parse_duration, parse_program_time};
use super::dvbviewer::{decode, RawRecording, RecordingsDoc, RemoteApi};
use super::library::RecordingsLibrary;
use super::timers::TimerCache;
use super::titles;
use crate::config::PathSubstitution;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    ChannelGroupKey, ChannelSnapshot, RecordingRecord, RecordingStatus, TimerRecord,
};

const RECORDINGS_PATH: &str = "api/recordings.html";
const DELETE_PATH: &str = "api/recdelete.html";

/// Recordings listing; rebuilt on every call
pub struct RecordingCatalog {
    api: Arc<dyn RemoteApi>,
    channels: Arc<ChannelCatalog>,
    timers: Arc<TimerCache>,
    classifier: Arc<GenreClassifier>,
    clock: Arc<dyn Clock>,
    tz: Tz,
    path_substitution: Option<PathSubstitution>,
}

impl RecordingCatalog {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        channels: Arc<ChannelCatalog>,
        timers: Arc<TimerCache>,
        classifier: Arc<GenreClassifier>,
        clock: Arc<dyn Clock>,
        tz: Tz,
        path_substitution: Option<PathSubstitution>,
    ) -> Self {
        Self {
            api,
            channels,
            timers,
            classifier,
            clock,
            tz,
            path_substitution,
        }
    }

    pub async fn list(&self, cancel: &CancellationToken) -> ServiceResult<Vec<RecordingRecord>> {
        let bytes = self
            .api
            .fetch(
                RECORDINGS_PATH,
                &[("utf8", "1".to_string()), ("images", "1".to_string())],
                cancel,
            )
            .await?;
        let doc: RecordingsDoc = decode(&bytes)?;

        let channels = match self.channels.get(ChannelGroupKey::Default, false, cancel).await {
            Ok(channels) => channels,
            Err(ServiceError::Cancelled) => return Err(ServiceError::Cancelled),
            Err(e) => {
                warn!("Recordings listed without channel ids: {}", e);
                Arc::new(ChannelSnapshot::default())
            }
        };
        let timers = match self.timers.snapshot(cancel).await {
            Ok(timers) => timers,
            Err(ServiceError::Cancelled) => return Err(ServiceError::Cancelled),
            Err(e) => {
                warn!("Recording status computed without timers: {}", e);
                Arc::new(Vec::new())
            }
        };

        let now = self.clock.now();
        let recordings: Vec<RecordingRecord> = doc
            .recordings
            .iter()
            .filter_map(|raw| {
                self.normalize(raw, doc.image_url.as_deref(), &channels, &timers, now)
            })
            .collect();

        info!("Loaded {} recordings", recordings.len());
        Ok(recordings)
    }

    /// Library view over the backend's recordings
    pub async fn library(&self, cancel: &CancellationToken) -> ServiceResult<RecordingsLibrary> {
        Ok(RecordingsLibrary::new(self.list(cancel).await?))
    }

    /// Remove the recording and its file
    pub async fn delete(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<()> {
        self.api
            .send(
                DELETE_PATH,
                &[("recid", id.to_string()), ("delfile", "1".to_string())],
                cancel,
            )
            .await
    }

    fn normalize(
        &self,
        raw: &RawRecording,
        image_base: Option<&str>,
        channels: &ChannelSnapshot,
        timers: &[TimerRecord],
        now: DateTime<Utc>,
    ) -> Option<RecordingRecord> {
        let (Some(start_utc), Some(duration)) = (
            parse_program_time(&raw.start, self.tz),
            parse_duration(&raw.duration),
        ) else {
            warn!(recording = %raw.id, "Skipping recording with unreadable start or duration");
            return None;
        };
        let end_utc = start_utc + duration;

        let name = raw.title.clone().unwrap_or_default();
        let episode = raw
            .info
            .as_deref()
            .map(titles::extract_episode)
            .unwrap_or_default();
        let overview = raw.desc.clone().filter(|d| !d.trim().is_empty());
        let channel_name = raw.channel.clone().unwrap_or_default();

        // Timer start already includes PreEPG, which is where the backend starts the file
        let airing = start_utc <= now && now <= end_utc;
        let recording_now = airing
            && timers
                .iter()
                .any(|t| t.status == RecordingStatus::InProgress && t.start_utc == start_utc);

        let path = raw.file.clone().unwrap_or_default();
        let path = match &self.path_substitution {
            Some(substitution) => substitution.apply(&path),
            None => path,
        };

        Some(RecordingRecord {
            id: raw.id.clone(),
            production_year: titles::extract_year(&name, raw.info.as_deref()),
            classification: self.classifier.classify(
                raw.content.as_deref(),
                overview.as_deref(),
                episode.has_episode(),
            ),
            episode_title: episode.clean_subtitle,
            season_number: episode.season,
            episode_number: episode.episode,
            name,
            overview,
            series: raw.series.clone().filter(|s| !s.trim().is_empty()),
            channel_id: channels.by_name(&channel_name).map(|c| c.id.clone()),
            channel_name,
            start_utc,
            end_utc,
            path,
            // Thumbnails exist only once the file is finished
            image_url: match (airing, image_base, raw.image.as_deref()) {
                (false, Some(base), Some(image)) if !image.is_empty() => {
                    Some(format!("{}{}", base, image))
                }
                _ => None,
            },
            status: if recording_now {
                RecordingStatus::InProgress
            } else {
                RecordingStatus::Completed
            },
        })
    }
}
