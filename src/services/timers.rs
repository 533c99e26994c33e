use chrono::Duration;
use chrono_tz::Tz;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cache::RefreshCell;
use super::channels::ChannelCatalog;
use super::clock::Clock;
use super::correlator::ScheduleCorrelator;
use super::dvbviewer::dates::parse_schedule_time;
use super::dvbviewer::{decode, RawTimer, RemoteApi, TimersDoc};
use super::series_timers::SeriesTimerCache;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    ChannelGroupKey, RecordingStatus, TimerFlags, TimerRecord, DEFAULT_PRIORITY,
};

const TIMERS_PATH: &str = "api/timerlist.html";

/// One-time timers, refreshed only after invalidation
pub struct TimerCache {
    api: Arc<dyn RemoteApi>,
    channels: Arc<ChannelCatalog>,
    series: Arc<SeriesTimerCache>,
    correlator: Arc<ScheduleCorrelator>,
    tz: Tz,
    cell: RefreshCell<Vec<TimerRecord>>,
}

impl TimerCache {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        channels: Arc<ChannelCatalog>,
        series: Arc<SeriesTimerCache>,
        correlator: Arc<ScheduleCorrelator>,
        tz: Tz,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            channels,
            series,
            correlator,
            tz,
            cell: RefreshCell::new("timers", None, clock),
        }
    }

    pub async fn snapshot(&self, cancel: &CancellationToken) -> ServiceResult<Arc<Vec<TimerRecord>>> {
        self.cell.get(false, || self.load(cancel)).await
    }

    pub async fn invalidate(&self) {
        self.cell.invalidate().await;
    }

    /// Series names that have a search behind them
    async fn known_series(&self, cancel: &CancellationToken) -> ServiceResult<HashSet<String>> {
        match self.series.snapshot(cancel).await {
            Ok(searches) => Ok(searches.iter().map(|s| s.name.clone()).collect()),
            Err(ServiceError::Cancelled) => Err(ServiceError::Cancelled),
            Err(e) => {
                warn!("Series timers unavailable, timers load without series links: {}", e);
                Ok(HashSet::new())
            }
        }
    }

    async fn load(&self, cancel: &CancellationToken) -> ServiceResult<Vec<TimerRecord>> {
        let bytes = self
            .api
            .fetch(TIMERS_PATH, &[("utf8", "2".to_string())], cancel)
            .await?;
        let doc: TimersDoc = decode(&bytes)?;
        let known_series = self.known_series(cancel).await?;
        // Timers resolve against the channels the host sees; the timer group only
        // scopes what searches create
        let channels = self.channels.get(ChannelGroupKey::Default, false, cancel).await?;

        let mut timers = Vec::new();
        for raw in doc.timers.iter().filter(|t| t.is_one_time()) {
            let Some(mut timer) = normalize_timer(raw, self.tz, &known_series) else {
                continue;
            };

            match channels.by_id(&timer.channel_id) {
                Some(channel) => {
                    self.correlator.correlate(&mut timer, channel, cancel).await?;
                }
                None => debug!(timer = %timer.id, "Timer channel {} not listed", timer.channel_id),
            }
            timers.push(timer);
        }
        timers.sort_by_key(|t| t.start_utc);

        info!("Loaded {} timers", timers.len());
        Ok(timers)
    }
}

fn parse_minutes(value: Option<&str>) -> i64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

/// Backend timer to host record; None when the entry lacks an id, channel or schedule
pub fn normalize_timer(raw: &RawTimer, tz: Tz, known_series: &HashSet<String>) -> Option<TimerRecord> {
    let id = raw.id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;

    let Some(schedule) = parse_schedule_time(&raw.date, &raw.start, tz) else {
        warn!(timer = id, "Skipping timer with unreadable schedule: {} {}", raw.date, raw.start);
        return None;
    };
    let Some(channel_id) = raw.channel_id() else {
        warn!(timer = id, "Skipping timer without channel");
        return None;
    };

    let pre = parse_minutes(raw.pre_epg.as_deref());
    let post = parse_minutes(raw.post_epg.as_deref());
    let duration = parse_minutes(raw.duration.as_deref());

    let name = raw.description.clone().unwrap_or_default();
    let series_link_id = raw
        .series
        .as_deref()
        .map(str::trim)
        .filter(|s| known_series.contains(*s))
        .map(String::from);

    Some(TimerRecord {
        id: id.to_string(),
        series_name: name.clone(),
        name,
        overview: None,
        channel_id: channel_id.to_string(),
        start_utc: schedule + Duration::minutes(pre),
        end_utc: schedule + Duration::minutes(duration - post),
        pre_padding_sec: (pre.max(0) * 60) as u32,
        post_padding_sec: (post.max(0) * 60) as u32,
        series_link_id,
        program_id: None,
        status: RecordingStatus::derive(TimerFlags::parse(
            raw.enabled.as_deref(),
            raw.executeable.as_deref(),
            raw.recording.as_deref(),
        )),
        priority: raw
            .priority
            .as_deref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PRIORITY),
        episode_title: None,
        season_number: None,
        episode_number: None,
        genres: Vec::new(),
    })
}
