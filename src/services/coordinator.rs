//! Refresh coordination and schedule mutations
//!
//! Every mutation is a remote call followed by a refresh of both schedule caches.
//! A failed remote call returns before the refresh; a failed refresh after a
//! successful call is only logged, since the mutation itself went through.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::channels::ChannelCatalog;
use super::correlator::ScheduleCorrelator;
use super::dvbviewer::dates::{delphi_day, format_window_time, minutes_of_day};
use super::dvbviewer::{RemoteApi, VersionDetector};
use super::guide::GuideReader;
use super::library::{LibraryLookup, LibraryMatcher};
use super::recordings::RecordingCatalog;
use super::series_timers::SeriesTimerCache;
use super::timers::TimerCache;
use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    Channel, ChannelGroupKey, DaysMask, RecordingStatus, SeriesTimerSpec, TimerDefaults,
    TimerRecord, TimerSpec, DEFAULT_PRIORITY, SKIP_IN_LIBRARY_PRIORITY,
};

const TIMER_ADD: &str = "api/timeradd.html";
const TIMER_EDIT: &str = "api/timeredit.html";
const TIMER_DELETE: &str = "api/timerdelete.html";
const SEARCH_ADD: &str = "api/searchadd.html";
const SEARCH_EDIT: &str = "api/searchedit.html";
const SEARCH_DELETE: &str = "api/searchdelete.html";
const TASKS: &str = "api/tasks.html";

lazy_static! {
    static ref SEARCH_PHRASE_UNSAFE: Regex = Regex::new(r"[^\w.-@! ]").unwrap();
}

/// Anchored search phrase matching exactly `name`; other characters become wildcards
pub fn search_phrase(name: &str) -> String {
    format!("^{}$", SEARCH_PHRASE_UNSAFE.replace_all(name, "?"))
}

/// Configuration the mutations read
#[derive(Debug, Clone)]
struct MutationSettings {
    pre_padding_sec: u32,
    post_padding_sec: u32,
    timer_task: Option<String>,
    check_recording_title: bool,
    check_recording_subtitle: bool,
    check_removed_recording: bool,
    check_timer_name: bool,
}

impl From<&Config> for MutationSettings {
    fn from(config: &Config) -> Self {
        Self {
            pre_padding_sec: config.timer_pre_padding_mins * 60,
            post_padding_sec: config.timer_post_padding_mins * 60,
            timer_task: config.timer_task.clone(),
            check_recording_title: config.check_recording_title,
            check_recording_subtitle: config.check_recording_subtitle,
            check_removed_recording: config.check_removed_recording,
            check_timer_name: config.check_timer_name,
        }
    }
}

fn flag(on: bool) -> String {
    String::from(if on { "1" } else { "0" })
}

pub struct RefreshCoordinator {
    api: Arc<dyn RemoteApi>,
    detector: Arc<VersionDetector>,
    channels: Arc<ChannelCatalog>,
    timers: Arc<TimerCache>,
    series: Arc<SeriesTimerCache>,
    guide: Arc<GuideReader>,
    recordings: Arc<RecordingCatalog>,
    tz: Tz,
    settings: MutationSettings,
}

impl RefreshCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        api: Arc<dyn RemoteApi>,
        detector: Arc<VersionDetector>,
        channels: Arc<ChannelCatalog>,
        timers: Arc<TimerCache>,
        series: Arc<SeriesTimerCache>,
        guide: Arc<GuideReader>,
        recordings: Arc<RecordingCatalog>,
    ) -> Self {
        Self {
            api,
            detector,
            channels,
            timers,
            series,
            guide,
            recordings,
            tz: config.backend_timezone,
            settings: MutationSettings::from(config),
        }
    }

    /// Invalidate and reload series timers, then timers
    pub async fn refresh_all(&self, cancel: &CancellationToken) -> ServiceResult<()> {
        self.series.invalidate().await;
        self.series.snapshot(cancel).await?;
        self.timers.invalidate().await;
        self.timers.snapshot(cancel).await?;
        Ok(())
    }

    async fn refresh_after_mutation(&self, cancel: &CancellationToken) {
        if let Err(e) = self.refresh_all(cancel).await {
            warn!("Refresh after schedule change failed: {}", e);
        }
    }

    pub fn timer_defaults(&self) -> TimerDefaults {
        TimerDefaults {
            pre_padding_sec: self.settings.pre_padding_sec,
            post_padding_sec: self.settings.post_padding_sec,
            record_any_channel: true,
            record_any_time: true,
            record_new_only: false,
            skip_if_in_library: false,
            days: DaysMask::ALL.weekdays(),
        }
    }

    async fn channel(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<Channel> {
        let channels = self.channels.get(ChannelGroupKey::Default, false, cancel).await?;
        channels
            .by_id(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("channel {}", id)))
    }

    /// Schedule parameters shared by add and edit: dor, start, stop, pre, post, after
    fn schedule_query(&self, spec: &TimerSpec) -> Vec<(&'static str, String)> {
        let pre = spec.pre_padding_sec.unwrap_or(self.settings.pre_padding_sec);
        let post = spec.post_padding_sec.unwrap_or(self.settings.post_padding_sec);
        let padded_start: DateTime<Utc> = spec.start_utc - Duration::seconds(pre as i64);
        let padded_end: DateTime<Utc> = spec.end_utc + Duration::seconds(post as i64);

        vec![
            ("dor", delphi_day(padded_start, self.tz).to_string()),
            ("start", minutes_of_day(padded_start, self.tz).to_string()),
            ("stop", minutes_of_day(padded_end, self.tz).to_string()),
            ("pre", (pre / 60).to_string()),
            ("post", (post / 60).to_string()),
            ("after", self.settings.timer_task.clone().unwrap_or_default()),
        ]
    }

    /// Episode title of the program the timer covers, if the guide has it
    async fn episode_title(
        &self,
        channel: &Channel,
        spec: &TimerSpec,
        cancel: &CancellationToken,
    ) -> ServiceResult<Option<String>> {
        match self
            .guide
            .programs(channel, spec.start_utc, spec.end_utc, cancel)
            .await
        {
            Ok(programs) => Ok(ScheduleCorrelator::find_match(&programs, spec.start_utc)
                .and_then(|p| p.episode_title.clone())),
            Err(ServiceError::Cancelled) => Err(ServiceError::Cancelled),
            Err(e) => {
                warn!("Guide lookup for new timer failed: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn create_timer(&self, spec: &TimerSpec, cancel: &CancellationToken) -> ServiceResult<()> {
        if spec.end_utc <= spec.start_utc {
            return Err(ServiceError::InvalidRequest("timer ends before it starts".to_string()));
        }
        let channel = self.channel(&spec.channel_id, cancel).await?;
        let title = match self.episode_title(&channel, spec, cancel).await? {
            Some(episode) => format!("{} - {}", spec.name, episode),
            None => spec.name.clone(),
        };
        let dialect = self.detector.dialect(cancel).await;

        let mut query = vec![
            ("title", title),
            ("encoding", "255".to_string()),
            (dialect.timer_channel_param(), channel.id.clone()),
        ];
        query.extend(self.schedule_query(spec));

        info!(
            "Create new schedule: {}, StartTime: {}, EndTime: {}, ChannelId: {}",
            spec.name, spec.start_utc, spec.end_utc, spec.channel_id
        );
        self.api.send(TIMER_ADD, &query, cancel).await?;
        self.refresh_after_mutation(cancel).await;
        Ok(())
    }

    pub async fn update_timer(&self, spec: &TimerSpec, cancel: &CancellationToken) -> ServiceResult<()> {
        let id = spec
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ServiceError::InvalidRequest("timer id is required".to_string()))?;

        let mut query = vec![("id", id)];
        query.extend(self.schedule_query(spec));

        info!("Change schedule: {}, StartTime: {}", spec.name, spec.start_utc);
        self.api.send(TIMER_EDIT, &query, cancel).await?;
        self.refresh_after_mutation(cancel).await;
        Ok(())
    }

    /// Disable an active timer, or delete one that is already disabled
    pub async fn cancel_timer(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<()> {
        let timers = self.timers.snapshot(cancel).await?;
        let timer = timers
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("timer {}", id)))?;

        self.cancel_record(timer, cancel).await?;
        self.refresh_after_mutation(cancel).await;
        Ok(())
    }

    async fn cancel_record(&self, timer: &TimerRecord, cancel: &CancellationToken) -> ServiceResult<()> {
        if timer.status == RecordingStatus::Cancelled {
            info!("Delete schedule with Id: {}", timer.id);
            self.api
                .send(TIMER_DELETE, &[("id", timer.id.clone())], cancel)
                .await
        } else {
            info!("Cancel schedule: {}, Id: {}", timer.name, timer.id);
            self.disable_timer(&timer.id, cancel).await
        }
    }

    async fn disable_timer(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<()> {
        self.api
            .send(
                TIMER_EDIT,
                &[("id", id.to_string()), ("enable", "0".to_string())],
                cancel,
            )
            .await
    }

    /// Ask the backend to turn searches into timers. The search change already
    /// went through, so a failed trigger is only logged.
    async fn trigger_auto_timer(&self, cancel: &CancellationToken) {
        if let Err(e) = self
            .api
            .send(TASKS, &[("task", "AutoTimer".to_string())], cancel)
            .await
        {
            warn!("AutoTimer task trigger failed: {}", e);
        }
    }

    /// Search parameters shared by add and edit
    async fn search_query(
        &self,
        spec: &SeriesTimerSpec,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<(&'static str, String)>> {
        let channels = match spec.channel_id.as_deref() {
            Some(id) => self.channel(id, cancel).await?.epg_id,
            None => String::new(),
        };
        let pre = spec.pre_padding_sec.unwrap_or(self.settings.pre_padding_sec);
        let post = spec.post_padding_sec.unwrap_or(self.settings.post_padding_sec);
        let new_only = spec.record_new_only;
        let any_time = (NaiveTime::from_hms_opt(0, 0, 0), NaiveTime::from_hms_opt(23, 59, 0));

        let mut query = vec![
            ("EPGBefore", (pre / 60).to_string()),
            ("EPGAfter", (post / 60).to_string()),
            ("AutoRecording", "1".to_string()),
        ];
        if let Some(task) = &self.settings.timer_task {
            query.push(("AfterProcessAction", task.clone()));
        }
        query.extend([
            ("CheckRecTitle", flag(new_only && self.settings.check_recording_title)),
            ("CheckRecSubtitle", flag(new_only && self.settings.check_recording_subtitle)),
            ("IncRemoved", flag(new_only && self.settings.check_removed_recording)),
            ("CheckTimer", flag(new_only && self.settings.check_timer_name)),
            ("Channels", channels),
            (
                "StartTime",
                spec.start_window
                    .or(any_time.0)
                    .map(format_window_time)
                    .unwrap_or_default(),
            ),
            (
                "EndTime",
                spec.end_window
                    .or(any_time.1)
                    .map(format_window_time)
                    .unwrap_or_default(),
            ),
            ("Days", DaysMask::from_weekdays(&spec.days).0.to_string()),
            (
                "Priority",
                if spec.skip_if_in_library {
                    SKIP_IN_LIBRARY_PRIORITY
                } else {
                    DEFAULT_PRIORITY
                }
                .to_string(),
            ),
        ]);

        Ok(query)
    }

    pub async fn create_series_timer(
        &self,
        spec: &SeriesTimerSpec,
        cancel: &CancellationToken,
    ) -> ServiceResult<()> {
        if spec.name.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("series timer name is required".to_string()));
        }

        let mut query = vec![
            ("Name", spec.name.clone()),
            ("SearchPhrase", search_phrase(&spec.name)),
            ("Series", spec.name.clone()),
        ];
        query.extend(self.search_query(spec, cancel).await?);

        info!("Create new AutoSearch: {}", spec.name);
        self.api.send(SEARCH_ADD, &query, cancel).await?;
        self.trigger_auto_timer(cancel).await;
        self.refresh_after_mutation(cancel).await;
        Ok(())
    }

    pub async fn update_series_timer(
        &self,
        spec: &SeriesTimerSpec,
        cancel: &CancellationToken,
    ) -> ServiceResult<()> {
        let name = spec.id.clone().unwrap_or_else(|| spec.name.clone());
        if name.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("series timer id is required".to_string()));
        }

        let mut query = vec![("Name", name.clone())];
        query.extend(self.search_query(spec, cancel).await?);

        info!("Changed AutoSearch: {}", name);
        self.api.send(SEARCH_EDIT, &query, cancel).await?;
        self.trigger_auto_timer(cancel).await;
        self.refresh_after_mutation(cancel).await;
        Ok(())
    }

    pub async fn cancel_series_timer(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<()> {
        info!("Delete AutoSearch with Id: {}", id);
        self.api
            .send(SEARCH_DELETE, &[("name", id.to_string())], cancel)
            .await?;
        self.refresh_after_mutation(cancel).await;
        Ok(())
    }

    /// Stop the timer that is still writing the recording, then delete the recording
    pub async fn delete_recording(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<()> {
        let recordings = self.recordings.list(cancel).await?;
        let recording = recordings
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("recording {}", id)))?;

        if recording.status == RecordingStatus::InProgress {
            let timers = self.timers.snapshot(cancel).await?;
            let active = timers.iter().find(|t| {
                t.status == RecordingStatus::InProgress
                    && Some(&t.channel_id) == recording.channel_id.as_ref()
                    && t.name.starts_with(&recording.name)
            });
            if let Some(timer) = active {
                info!("Stopping active timer {} before deleting recording {}", timer.id, id);
                self.disable_timer(&timer.id, cancel).await?;
            }
        }

        info!("Delete Recording with Id: {}", id);
        self.recordings.delete(id, cancel).await?;
        self.refresh_after_mutation(cancel).await;
        Ok(())
    }

    /// Drop series timers that no longer match a guide entry and, when a library is
    /// given, disable "skip if in library" timers whose episode is already there.
    /// Each timer gets both checks. Returns the number of changes.
    pub async fn suppress_duplicates(
        &self,
        library: Option<(&LibraryMatcher, &dyn LibraryLookup)>,
        cancel: &CancellationToken,
    ) -> ServiceResult<usize> {
        let timers = self.timers.snapshot(cancel).await?;
        let mut changed = 0;

        for timer in timers.iter().filter(|t| t.status == RecordingStatus::New) {
            if timer.series_link_id.is_some() && timer.program_id.is_none() {
                info!("Removing orphaned series timer: {}", timer.name);
                let result = self
                    .api
                    .send(TIMER_DELETE, &[("id", timer.id.clone())], cancel)
                    .await;
                if result.is_ok() {
                    self.trigger_auto_timer(cancel).await;
                }
                changed += tally(timer, result)?;
            }

            let in_library = library.map_or(false, |(matcher, lookup)| {
                timer.priority == SKIP_IN_LIBRARY_PRIORITY && matcher.is_in_library(timer, lookup)
            });
            if in_library {
                info!(
                    "Cancel schedule: \"{}\" already exists in library",
                    timer.name
                );
                let result = self.disable_timer(&timer.id, cancel).await;
                changed += tally(timer, result)?;
            }
        }

        if changed > 0 {
            self.refresh_all(cancel).await?;
        }
        Ok(changed)
    }
}

/// 1 for a change that went through; failures other than cancellation are logged and skipped
fn tally(timer: &TimerRecord, result: ServiceResult<()>) -> ServiceResult<usize> {
    match result {
        Ok(()) => Ok(1),
        Err(ServiceError::Cancelled) => Err(ServiceError::Cancelled),
        Err(e) => {
            warn!(timer = %timer.id, "Suppressing timer failed: {}", e);
            Ok(0)
        }
    }
}
