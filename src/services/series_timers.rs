use chrono::NaiveTime;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::cache::RefreshCell;
use super::channels::ChannelCatalog;
use super::clock::Clock;
use super::dvbviewer::dates::parse_window_time;
use super::dvbviewer::{decode_searches, RemoteApi, SearchEntry, VersionDetector};
use crate::error::ServiceResult;
use crate::models::{
    ChannelGroupKey, ChannelSnapshot, DaysMask, SeriesTimerRecord, DEFAULT_PRIORITY,
    SKIP_IN_LIBRARY_PRIORITY,
};

const SEARCHES_PATH: &str = "api/searchlist.html";

/// Recurring searches, refreshed only after invalidation
pub struct SeriesTimerCache {
    api: Arc<dyn RemoteApi>,
    channels: Arc<ChannelCatalog>,
    detector: Arc<VersionDetector>,
    cell: RefreshCell<Vec<SeriesTimerRecord>>,
}

impl SeriesTimerCache {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        channels: Arc<ChannelCatalog>,
        detector: Arc<VersionDetector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            channels,
            detector,
            cell: RefreshCell::new("series_timers", None, clock),
        }
    }

    pub async fn snapshot(
        &self,
        cancel: &CancellationToken,
    ) -> ServiceResult<Arc<Vec<SeriesTimerRecord>>> {
        self.cell.get(false, || self.load(cancel)).await
    }

    pub async fn invalidate(&self) {
        self.cell.invalidate().await;
    }

    async fn load(&self, cancel: &CancellationToken) -> ServiceResult<Vec<SeriesTimerRecord>> {
        let dialect = self.detector.dialect(cancel).await;
        let bytes = self.api.fetch(SEARCHES_PATH, &[], cancel).await?;
        let searches = decode_searches(&bytes, dialect)?;
        let channels = self
            .channels
            .get(ChannelGroupKey::Default, false, cancel)
            .await?;

        let mut records: Vec<SeriesTimerRecord> = searches
            .iter()
            .filter(|s| !s.name.trim().is_empty())
            .map(|s| normalize_search(s, &channels))
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));

        info!("Loaded {} series timers", records.len());
        Ok(records)
    }
}

fn is_set(flag: Option<&str>) -> bool {
    matches!(flag.map(str::trim), Some("-1") | Some("1"))
}

fn parse_minutes(value: Option<&str>) -> u32 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

/// "00:00" - "23:59" is the backend's way of saying "any time"
fn parse_window(start: Option<&str>, end: Option<&str>) -> (Option<NaiveTime>, Option<NaiveTime>) {
    let (Some(start), Some(end)) = (start.and_then(parse_window_time), end.and_then(parse_window_time)) else {
        return (None, None);
    };

    if Some(start) == NaiveTime::from_hms_opt(0, 0, 0)
        && Some(end) == NaiveTime::from_hms_opt(23, 59, 0)
    {
        (None, None)
    } else {
        (Some(start), Some(end))
    }
}

pub fn normalize_search(search: &SearchEntry, channels: &ChannelSnapshot) -> SeriesTimerRecord {
    let channel_id = search.channels.first().and_then(|epg_id| {
        let found = channels.by_epg_id(epg_id.trim()).map(|c| c.id.clone());
        if found.is_none() {
            warn!(search = %search.name, "Search channel {} not in channel list", epg_id);
        }
        found
    });

    let (start_window, end_window) =
        parse_window(search.start_time.as_deref(), search.end_time.as_deref());

    let days_mask = search
        .days
        .as_deref()
        .and_then(|d| d.trim().parse::<u8>().ok())
        .filter(|d| *d != 0)
        .unwrap_or(DaysMask::ALL.0);

    let priority = search
        .priority
        .as_deref()
        .and_then(|p| p.trim().parse::<i32>().ok())
        .unwrap_or(DEFAULT_PRIORITY);

    SeriesTimerRecord {
        id: search.name.clone(),
        name: search.name.clone(),
        channel_id,
        start_window,
        end_window,
        days: DaysMask(days_mask).weekdays(),
        days_mask,
        pre_padding_sec: parse_minutes(search.epg_before.as_deref()) * 60,
        post_padding_sec: parse_minutes(search.epg_after.as_deref()) * 60,
        record_new_only: is_set(search.check_rec_title.as_deref())
            || is_set(search.check_rec_subtitle.as_deref())
            || is_set(search.check_timer.as_deref()),
        skip_if_in_library: priority == SKIP_IN_LIBRARY_PRIORITY,
        priority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Channel;
    use crate::services::clock::SystemClock;
    use crate::services::testing::FakeApi;
    use chrono::Weekday;

    fn snapshot() -> ChannelSnapshot {
        ChannelSnapshot::new(vec![Channel {
            id: "5".to_string(),
            epg_id: "100".to_string(),
            number: 1,
            name: "Das Erste HD".to_string(),
            logo_ref: None,
            logo_url: None,
            is_radio: false,
            group_name: None,
        }])
    }

    #[test]
    fn test_normalize_search() {
        let search = SearchEntry {
            name: "Tatort".to_string(),
            start_time: Some("20:00".to_string()),
            end_time: Some("22:00".to_string()),
            epg_before: Some("5".to_string()),
            epg_after: Some("10".to_string()),
            days: Some("64".to_string()),
            channels: vec!["100".to_string()],
            priority: Some("49".to_string()),
            check_rec_title: Some("-1".to_string()),
            ..SearchEntry::default()
        };

        let record = normalize_search(&search, &snapshot());
        assert_eq!(record.id, "Tatort");
        assert_eq!(record.channel_id.as_deref(), Some("5"));
        assert_eq!(record.start_window, NaiveTime::from_hms_opt(20, 0, 0));
        assert_eq!(record.days, vec![Weekday::Sun]);
        assert_eq!(record.pre_padding_sec, 300);
        assert_eq!(record.post_padding_sec, 600);
        assert!(record.record_new_only);
        assert!(record.skip_if_in_library);
    }

    #[test]
    fn test_any_time_any_channel() {
        let search = SearchEntry {
            name: "Krimi".to_string(),
            start_time: Some("00:00".to_string()),
            end_time: Some("23:59".to_string()),
            check_rec_title: Some("0".to_string()),
            ..SearchEntry::default()
        };

        let record = normalize_search(&search, &snapshot());
        assert_eq!(record.channel_id, None);
        assert_eq!((record.start_window, record.end_window), (None, None));
        assert_eq!(record.days_mask, 127);
        assert_eq!(record.days.len(), 7);
        assert!(!record.record_new_only);
        assert!(!record.skip_if_in_library);
        assert_eq!(record.priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn test_unknown_channel_means_any() {
        let search = SearchEntry {
            name: "Sport".to_string(),
            channels: vec!["999".to_string()],
            ..SearchEntry::default()
        };
        assert_eq!(normalize_search(&search, &snapshot()).channel_id, None);
    }

    #[tokio::test]
    async fn test_snapshot_sorted_and_cached() {
        let api = Arc::new(FakeApi::new());
        api.respond(
            "api/getchannelsxml.html",
            r#"<channels><root><group><channel ID="5" EPGID="100" name="Das Erste HD" flags="24"/></group></root></channels>"#,
        );
        api.respond(
            "api/getconfigfile.html",
            r#"<settings><section name="Service"><entry name="Version">DVBViewer Media Server 2.1.6.0</entry></section></settings>"#,
        );
        api.respond(
            SEARCHES_PATH,
            r#"<Searches><Search Name="Zebra"/><Search Name="Alpha"><Channels><Channel>100</Channel></Channels></Search></Searches>"#,
        );

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let channels = Arc::new(ChannelCatalog::new(&Config::default(), api.clone(), None, clock.clone()));
        let detector = Arc::new(VersionDetector::new(api.clone()));
        let cache = SeriesTimerCache::new(api.clone(), channels, detector, clock);
        let cancel = CancellationToken::new();

        let snapshot = cache.snapshot(&cancel).await.unwrap();
        let names: Vec<_> = snapshot.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zebra"]);
        assert_eq!(snapshot[0].channel_id.as_deref(), Some("5"));

        cache.snapshot(&cancel).await.unwrap();
        assert_eq!(api.calls(SEARCHES_PATH), 1);

        cache.invalidate().await;
        cache.snapshot(&cancel).await.unwrap();
        assert_eq!(api.calls(SEARCHES_PATH), 2);
    }
}
