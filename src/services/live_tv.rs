//! Host-facing live TV operations
//!
//! Builds the cache and correlation components once and exposes the operations
//! the HTTP layer serves. Nothing here is global; the service is passed around
//! in `AppState`.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::channels::ChannelCatalog;
use super::classifier::GenreClassifier;
use super::clock::Clock;
use super::coordinator::RefreshCoordinator;
use super::correlator::ScheduleCorrelator;
use super::dvbviewer::{ImageUrlResolver, RemoteApi, VersionDetector};
use super::guide::GuideReader;
use super::recordings::RecordingCatalog;
use super::series_timers::SeriesTimerCache;
use super::timers::TimerCache;
use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    BackendState, Channel, ChannelGroup, ChannelGroupKey, Program, RecordingRecord,
    SeriesTimerRecord, SeriesTimerSpec, ServiceStatus, TimerDefaults, TimerRecord, TimerSpec,
};

pub struct LiveTvService {
    detector: Arc<VersionDetector>,
    channels: Arc<ChannelCatalog>,
    guide: Arc<GuideReader>,
    timers: Arc<TimerCache>,
    series: Arc<SeriesTimerCache>,
    recordings: Arc<RecordingCatalog>,
    coordinator: Arc<RefreshCoordinator>,
}

impl LiveTvService {
    pub fn new(
        config: &Config,
        api: Arc<dyn RemoteApi>,
        logos: Option<Arc<dyn ImageUrlResolver>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tz = config.backend_timezone;
        let classifier = Arc::new(GenreClassifier::new(config.genres.clone()));
        let detector = Arc::new(VersionDetector::new(api.clone()));
        let channels = Arc::new(ChannelCatalog::new(config, api.clone(), logos, clock.clone()));
        let guide = Arc::new(GuideReader::new(api.clone(), classifier.clone(), tz));
        let correlator = Arc::new(ScheduleCorrelator::new(guide.clone()));
        let series = Arc::new(SeriesTimerCache::new(
            api.clone(),
            channels.clone(),
            detector.clone(),
            clock.clone(),
        ));
        let timers = Arc::new(TimerCache::new(
            api.clone(),
            channels.clone(),
            series.clone(),
            correlator,
            tz,
            clock.clone(),
        ));
        let recordings = Arc::new(RecordingCatalog::new(
            api.clone(),
            channels.clone(),
            timers.clone(),
            classifier,
            clock,
            tz,
            config.path_substitution.clone(),
        ));
        let coordinator = Arc::new(RefreshCoordinator::new(
            config,
            api,
            detector.clone(),
            channels.clone(),
            timers.clone(),
            series.clone(),
            guide.clone(),
            recordings.clone(),
        ));

        Self {
            detector,
            channels,
            guide,
            timers,
            series,
            recordings,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> Arc<RefreshCoordinator> {
        self.coordinator.clone()
    }

    pub fn recordings(&self) -> Arc<RecordingCatalog> {
        self.recordings.clone()
    }

    // ========================================================================
    // Channels & guide
    // ========================================================================

    pub async fn list_channels(&self, cancel: &CancellationToken) -> ServiceResult<Vec<Channel>> {
        let snapshot = self.channels.get(ChannelGroupKey::Default, true, cancel).await?;
        Ok(snapshot.channels.clone())
    }

    pub async fn list_channel_groups(
        &self,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<ChannelGroup>> {
        self.channels.list_groups(cancel).await
    }

    /// Guide entries; an unknown channel yields an empty list
    pub async fn list_programs(
        &self,
        channel_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<Program>> {
        if end <= start {
            return Err(ServiceError::InvalidRequest("end must be after start".to_string()));
        }

        let channels = self.channels.get(ChannelGroupKey::Default, false, cancel).await?;
        let Some(channel) = channels.by_id(channel_id) else {
            warn!("Guide requested for unknown channel {}", channel_id);
            return Ok(Vec::new());
        };

        self.guide.programs(channel, start, end, cancel).await
    }

    // ========================================================================
    // Timers
    // ========================================================================

    pub async fn list_timers(&self, cancel: &CancellationToken) -> ServiceResult<Vec<TimerRecord>> {
        Ok(self.timers.snapshot(cancel).await?.to_vec())
    }

    pub async fn create_timer(&self, spec: &TimerSpec, cancel: &CancellationToken) -> ServiceResult<()> {
        self.coordinator.create_timer(spec, cancel).await
    }

    pub async fn update_timer(&self, spec: &TimerSpec, cancel: &CancellationToken) -> ServiceResult<()> {
        self.coordinator.update_timer(spec, cancel).await
    }

    pub async fn cancel_timer(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<()> {
        self.coordinator.cancel_timer(id, cancel).await
    }

    pub fn timer_defaults(&self) -> TimerDefaults {
        self.coordinator.timer_defaults()
    }

    pub async fn list_series_timers(
        &self,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<SeriesTimerRecord>> {
        Ok(self.series.snapshot(cancel).await?.to_vec())
    }

    pub async fn create_series_timer(
        &self,
        spec: &SeriesTimerSpec,
        cancel: &CancellationToken,
    ) -> ServiceResult<()> {
        self.coordinator.create_series_timer(spec, cancel).await
    }

    pub async fn update_series_timer(
        &self,
        spec: &SeriesTimerSpec,
        cancel: &CancellationToken,
    ) -> ServiceResult<()> {
        self.coordinator.update_series_timer(spec, cancel).await
    }

    pub async fn cancel_series_timer(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<()> {
        self.coordinator.cancel_series_timer(id, cancel).await
    }

    // ========================================================================
    // Recordings
    // ========================================================================

    pub async fn list_recordings(
        &self,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<RecordingRecord>> {
        self.recordings.list(cancel).await
    }

    pub async fn delete_recording(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<()> {
        self.coordinator.delete_recording(id, cancel).await
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Backend reachability, telling rejected credentials apart from a dead host
    pub async fn status(&self, cancel: &CancellationToken) -> ServiceStatus {
        match self.detector.fetch_version(cancel).await {
            Ok(version) => ServiceStatus {
                status: BackendState::Ok,
                version: Some(version),
                message: None,
            },
            Err(e) => ServiceStatus {
                status: match e {
                    ServiceError::Authentication => BackendState::Unauthorized,
                    ServiceError::Network(_) => BackendState::Unreachable,
                    _ => BackendState::Error,
                },
                version: None,
                message: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathSubstitution;
    use crate::models::{Classification, RecordingStatus};
    use crate::services::clock::{ManualClock, SystemClock};
    use crate::config::LibraryProfile;
    use crate::services::library::{LibraryLookup, LibraryMatcher, RecordingsLibrary};
    use crate::services::refresh_task::{run_refresh, RefreshTaskConfig};
    use crate::services::testing::FakeApi;
    use chrono::Weekday;

    const CHANNELS: &str = r#"<channels><root name="Favourites"><group name="TV"><channel nr="1" name="Das Erste HD" EPGID="100" flags="24" ID="5"/></group></root></channels>"#;

    const GUIDE: &str = r#"<epg Ver="2">
  <programme start="20230101200000" stop="20230101213000" channel="100">
    <titles><title>Tatort</title></titles>
    <events><event>S01E02 Der Fall</event></events>
    <descriptions><description>Krimi aus Münster</description></descriptions>
    <content>21</content>
  </programme>
</epg>"#;

    const SETTINGS: &str = r#"<settings><section name="Service"><entry name="Version">DVBViewer Media Server 2.1.6.0</entry></section></settings>"#;

    fn timer_xml(id: &str, enabled: &str, recording: &str, start: &str, priority: &str, series: &str) -> String {
        let series = if series.is_empty() {
            String::new()
        } else {
            format!("<Series>{series}</Series>")
        };
        format!(
            r#"<Timer Type="1" Enabled="{enabled}" Priority="{priority}" Date="01.01.2023" Start="{start}" Dur="105" End="21:40:00" Days="-------" PreEPG="5" PostEPG="10"><Descr>Tatort</Descr><Channel ID="5|Das Erste HD"/><ID>{id}</ID><Executeable>-1</Executeable><Recording>{recording}</Recording>{series}</Timer>"#
        )
    }

    fn library_item(series: &str, season: u32, episode: u32) -> RecordingRecord {
        RecordingRecord {
            id: "99".to_string(),
            name: series.to_string(),
            episode_title: None,
            season_number: Some(season),
            episode_number: Some(episode),
            production_year: None,
            overview: None,
            series: Some(series.to_string()),
            channel_id: None,
            channel_name: String::new(),
            start_utc: utc("2022-12-01T20:00:00Z"),
            end_utc: utc("2022-12-01T21:30:00Z"),
            path: String::new(),
            image_url: None,
            status: RecordingStatus::Completed,
            classification: Classification::default(),
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn backend(timers: &[String]) -> Arc<FakeApi> {
        let api = Arc::new(FakeApi::new());
        api.respond("api/getchannelsxml.html", CHANNELS);
        api.respond("api/epg.html", GUIDE);
        api.respond("api/getconfigfile.html", SETTINGS);
        api.respond(
            "api/searchlist.html",
            r#"<Searches><Search Name="Tatort" AutoRecording="-1"><Priority>49</Priority><Series>Tatort</Series></Search></Searches>"#,
        );
        api.respond(
            "api/timerlist.html",
            &format!("<Timers>{}</Timers>", timers.concat()),
        );
        for path in [
            "api/timeradd.html",
            "api/timeredit.html",
            "api/timerdelete.html",
            "api/searchadd.html",
            "api/searchedit.html",
            "api/searchdelete.html",
            "api/tasks.html",
            "api/recdelete.html",
        ] {
            api.respond(path, "");
        }
        api
    }

    fn service(api: Arc<FakeApi>, config: Config) -> LiveTvService {
        LiveTvService::new(&config, api, None, Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_timer_is_correlated_with_guide() {
        let api = backend(&[timer_xml("1", "-1", "0", "19:55:00", "50", "")]);
        let service = service(api, Config::default());

        let timers = service.list_timers(&CancellationToken::new()).await.unwrap();
        assert_eq!(timers.len(), 1);

        let timer = &timers[0];
        assert_eq!(timer.channel_id, "5");
        assert_eq!(timer.start_utc, utc("2023-01-01T20:00:00Z"));
        assert_eq!(timer.program_id.as_deref(), Some("5|20230101200000|20230101213000"));
        assert_eq!(timer.series_name, "Tatort");
        assert_eq!(timer.name, "Tatort - Der Fall");
        assert_eq!(timer.overview.as_deref(), Some("Krimi aus Münster"));
        assert_eq!(timer.season_number, Some(1));
        assert_eq!(timer.episode_number, Some(2));
        assert_eq!(timer.status, RecordingStatus::New);
    }

    #[tokio::test]
    async fn test_uncorrelated_timer_keeps_backend_name() {
        let api = backend(&[timer_xml("1", "-1", "0", "21:55:00", "50", "")]);
        let service = service(api, Config::default());

        let timers = service.list_timers(&CancellationToken::new()).await.unwrap();
        assert_eq!(timers[0].name, "Tatort");
        assert_eq!(timers[0].program_id, None);
    }

    #[tokio::test]
    async fn test_list_programs_unknown_channel_is_empty() {
        let api = backend(&[]);
        let service = service(api.clone(), Config::default());

        let programs = service
            .list_programs(
                "99",
                utc("2023-01-01T18:00:00Z"),
                utc("2023-01-01T23:00:00Z"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(programs.is_empty());
        assert_eq!(api.calls("api/epg.html"), 0);
    }

    #[tokio::test]
    async fn test_create_timer_request() {
        let api = backend(&[]);
        let service = service(api.clone(), Config::default());
        let spec = TimerSpec {
            id: None,
            name: "Tatort".to_string(),
            channel_id: "5".to_string(),
            program_id: None,
            start_utc: utc("2023-01-01T20:00:00Z"),
            end_utc: utc("2023-01-01T21:30:00Z"),
            pre_padding_sec: None,
            post_padding_sec: None,
        };

        service.create_timer(&spec, &CancellationToken::new()).await.unwrap();

        let query = &api.queries("api/timeradd.html")[0];
        let get = |k: &str| query.get(k).map(String::as_str);
        assert_eq!(get("title"), Some("Tatort - Der Fall"));
        assert_eq!(get("encoding"), Some("255"));
        assert_eq!(get("ch"), Some("5"));
        assert_eq!(get("dor"), Some("44927"));
        assert_eq!(get("start"), Some("1195"));
        assert_eq!(get("stop"), Some("1300"));
        assert_eq!(get("pre"), Some("5"));
        assert_eq!(get("post"), Some("10"));
        assert_eq!(get("after"), Some(""));

        // Mutation is followed by a refresh of both caches
        assert_eq!(api.calls("api/searchlist.html"), 1);
        assert_eq!(api.calls("api/timerlist.html"), 1);
    }

    #[tokio::test]
    async fn test_failed_mutation_does_not_refresh() {
        let api = backend(&[]);
        api.fail("api/timeradd.html", ServiceError::Http(500));
        let service = service(api.clone(), Config::default());
        let spec = TimerSpec {
            id: None,
            name: "Tatort".to_string(),
            channel_id: "5".to_string(),
            program_id: None,
            start_utc: utc("2023-01-01T20:00:00Z"),
            end_utc: utc("2023-01-01T21:30:00Z"),
            pre_padding_sec: Some(0),
            post_padding_sec: Some(0),
        };

        let result = service.create_timer(&spec, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ServiceError::Http(500))));
        assert_eq!(api.calls("api/timerlist.html"), 0);
        assert_eq!(api.calls("api/searchlist.html"), 0);
    }

    #[tokio::test]
    async fn test_cancel_timer_disables_active_timer() {
        let api = backend(&[timer_xml("1", "-1", "0", "19:55:00", "50", "")]);
        let service = service(api.clone(), Config::default());
        let cancel = CancellationToken::new();

        service.cancel_timer("1", &cancel).await.unwrap();

        let query = &api.queries("api/timeredit.html")[0];
        assert_eq!(query.get("id").map(String::as_str), Some("1"));
        assert_eq!(query.get("enable").map(String::as_str), Some("0"));
        assert_eq!(api.calls("api/timerdelete.html"), 0);
    }

    #[tokio::test]
    async fn test_cancel_timer_deletes_disabled_timer() {
        let api = backend(&[timer_xml("1", "0", "0", "19:55:00", "50", "")]);
        let service = service(api.clone(), Config::default());

        service.cancel_timer("1", &CancellationToken::new()).await.unwrap();

        assert_eq!(api.calls("api/timerdelete.html"), 1);
        assert_eq!(api.calls("api/timeredit.html"), 0);
    }

    #[tokio::test]
    async fn test_cancel_unknown_timer_is_not_found() {
        let api = backend(&[]);
        let service = service(api, Config::default());

        let result = service.cancel_timer("42", &CancellationToken::new()).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_series_timer_request() {
        let api = backend(&[]);
        let service = service(api.clone(), Config::default());
        let spec = SeriesTimerSpec {
            id: None,
            name: "Tatort".to_string(),
            channel_id: Some("5".to_string()),
            start_window: None,
            end_window: None,
            days: vec![Weekday::Sun],
            pre_padding_sec: None,
            post_padding_sec: None,
            record_new_only: true,
            skip_if_in_library: true,
        };

        service
            .create_series_timer(&spec, &CancellationToken::new())
            .await
            .unwrap();

        let query = &api.queries("api/searchadd.html")[0];
        let get = |k: &str| query.get(k).map(String::as_str);
        assert_eq!(get("Name"), Some("Tatort"));
        assert_eq!(get("SearchPhrase"), Some("^Tatort$"));
        assert_eq!(get("Channels"), Some("100"));
        assert_eq!(get("StartTime"), Some("00:00"));
        assert_eq!(get("EndTime"), Some("23:59"));
        assert_eq!(get("Days"), Some("64"));
        assert_eq!(get("Priority"), Some("49"));
        assert_eq!(get("CheckRecTitle"), Some("1"));
        assert_eq!(get("AutoRecording"), Some("1"));

        let tasks = api.queries("api/tasks.html");
        assert_eq!(tasks[0].get("task").map(String::as_str), Some("AutoTimer"));
        assert_eq!(api.calls("api/searchlist.html"), 1);
    }

    fn series_spec(id: Option<&str>, name: &str) -> SeriesTimerSpec {
        SeriesTimerSpec {
            id: id.map(String::from),
            name: name.to_string(),
            channel_id: None,
            start_window: None,
            end_window: None,
            days: Vec::new(),
            pre_padding_sec: None,
            post_padding_sec: None,
            record_new_only: false,
            skip_if_in_library: false,
        }
    }

    #[tokio::test]
    async fn test_series_timer_survives_failed_auto_timer_trigger() {
        let api = backend(&[]);
        api.fail("api/tasks.html", ServiceError::Http(500));
        let service = service(api.clone(), Config::default());
        let cancel = CancellationToken::new();

        service.list_series_timers(&cancel).await.unwrap();
        assert_eq!(api.calls("api/searchlist.html"), 1);

        service
            .create_series_timer(&series_spec(None, "Krimi"), &cancel)
            .await
            .unwrap();

        assert_eq!(api.calls("api/searchadd.html"), 1);
        assert_eq!(api.calls("api/tasks.html"), 1);
        // The search was added, so both caches reload anyway
        assert_eq!(api.calls("api/searchlist.html"), 2);
        assert_eq!(api.calls("api/timerlist.html"), 1);
    }

    #[tokio::test]
    async fn test_update_series_timer_request() {
        let api = backend(&[]);
        let service = service(api.clone(), Config::default());
        let cancel = CancellationToken::new();

        service
            .update_series_timer(&series_spec(None, "Tatort"), &cancel)
            .await
            .unwrap();
        service
            .update_series_timer(&series_spec(Some("Krimi"), "Tatort"), &cancel)
            .await
            .unwrap();

        let edits = api.queries("api/searchedit.html");
        let get = |i: usize, k: &str| edits[i].get(k).cloned();
        assert_eq!(get(0, "Name").as_deref(), Some("Tatort"));
        assert_eq!(get(1, "Name").as_deref(), Some("Krimi"));
        assert_eq!(get(0, "SearchPhrase"), None);
        assert_eq!(get(0, "Channels").as_deref(), Some(""));
        assert_eq!(get(0, "Days").as_deref(), Some("127"));
        assert_eq!(get(0, "Priority").as_deref(), Some("50"));
        assert_eq!(get(0, "CheckRecTitle").as_deref(), Some("0"));
        assert_eq!(get(0, "EPGBefore").as_deref(), Some("5"));
        assert_eq!(get(0, "EPGAfter").as_deref(), Some("10"));
        assert_eq!(api.calls("api/tasks.html"), 2);
        assert_eq!(api.calls("api/searchlist.html"), 2);
    }

    #[tokio::test]
    async fn test_cancel_series_timer_request() {
        let api = backend(&[]);
        let service = service(api.clone(), Config::default());
        let cancel = CancellationToken::new();

        service.list_series_timers(&cancel).await.unwrap();
        service.cancel_series_timer("Tatort", &cancel).await.unwrap();

        let deleted = api.queries("api/searchdelete.html");
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].get("name").map(String::as_str), Some("Tatort"));
        assert_eq!(api.calls("api/searchlist.html"), 2);
        assert_eq!(api.calls("api/timerlist.html"), 1);
    }

    #[tokio::test]
    async fn test_timers_resolve_channels_from_default_group() {
        let api = backend(&[timer_xml("1", "-1", "0", "19:55:00", "50", "")]);
        let config = Config {
            timer_channel_group: Some("Radio".to_string()),
            ..Config::default()
        };
        let service = service(api.clone(), config);

        let timers = service.list_timers(&CancellationToken::new()).await.unwrap();
        assert!(timers[0].program_id.is_some());

        let channel_queries = api.queries("api/getchannelsxml.html");
        assert!(!channel_queries.is_empty());
        assert!(channel_queries.iter().all(|q| q.get("root").is_none()));
        assert!(channel_queries
            .iter()
            .all(|q| q.get("favonly").map(String::as_str) == Some("1")));
    }

    #[tokio::test]
    async fn test_series_timer_unknown_channel() {
        let api = backend(&[]);
        let service = service(api.clone(), Config::default());
        let spec = SeriesTimerSpec {
            id: None,
            name: "Tatort".to_string(),
            channel_id: Some("99".to_string()),
            start_window: None,
            end_window: None,
            days: Vec::new(),
            pre_padding_sec: None,
            post_padding_sec: None,
            record_new_only: false,
            skip_if_in_library: false,
        };

        let result = service.create_series_timer(&spec, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        assert_eq!(api.calls("api/searchadd.html"), 0);
    }

    #[tokio::test]
    async fn test_series_link_and_list() {
        let api = backend(&[timer_xml("1", "-1", "0", "19:55:00", "49", "Tatort")]);
        let service = service(api, Config::default());
        let cancel = CancellationToken::new();

        let series = service.list_series_timers(&cancel).await.unwrap();
        assert_eq!(series.len(), 1);
        assert!(series[0].skip_if_in_library);

        let timers = service.list_timers(&cancel).await.unwrap();
        assert_eq!(timers[0].series_link_id.as_deref(), Some("Tatort"));
        assert_eq!(timers[0].priority, 49);
    }

    #[tokio::test]
    async fn test_suppress_duplicates() {
        let api = backend(&[
            timer_xml("1", "-1", "0", "19:55:00", "49", "Tatort"),
            timer_xml("2", "-1", "0", "21:55:00", "50", "Tatort"),
        ]);
        let service = service(api.clone(), Config::default());
        let cancel = CancellationToken::new();

        let library = RecordingsLibrary::new(vec![library_item("Tatort", 1, 2)]);
        let matcher = LibraryMatcher::new(LibraryProfile::SeasonEpisode);
        let changed = service
            .coordinator()
            .suppress_duplicates(Some((&matcher, &library as &dyn LibraryLookup)), &cancel)
            .await
            .unwrap();

        assert_eq!(changed, 2);
        let deleted = api.queries("api/timerdelete.html");
        assert_eq!(deleted[0].get("id").map(String::as_str), Some("2"));
        assert_eq!(api.calls("api/tasks.html"), 1);
        let disabled = api.queries("api/timeredit.html");
        assert_eq!(disabled[0].get("id").map(String::as_str), Some("1"));
        assert_eq!(disabled[0].get("enable").map(String::as_str), Some("0"));
    }

    #[tokio::test]
    async fn test_refresh_removes_orphans_without_library_check() {
        let api = backend(&[
            timer_xml("1", "-1", "0", "19:55:00", "49", "Tatort"),
            timer_xml("2", "-1", "0", "21:55:00", "50", "Tatort"),
        ]);
        let service = service(api.clone(), Config::default());
        let config = RefreshTaskConfig {
            interval_secs: 900,
            skip_already_in_library: false,
            library_profile: LibraryProfile::SeasonEpisode,
        };

        let result = run_refresh(
            &service.coordinator(),
            &service.recordings(),
            &config,
            &CancellationToken::new(),
        )
        .await;

        assert!(result.is_success());
        assert_eq!(result.timers_suppressed, 1);
        let deleted = api.queries("api/timerdelete.html");
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].get("id").map(String::as_str), Some("2"));
        assert_eq!(api.calls("api/tasks.html"), 1);
        // Library check is off: no recordings lookup, priority 49 timer left alone
        assert_eq!(api.calls("api/recordings.html"), 0);
        assert_eq!(api.calls("api/timeredit.html"), 0);
    }

    #[tokio::test]
    async fn test_recordings_status_and_path() {
        let api = backend(&[timer_xml("1", "-1", "-1", "19:55:00", "50", "")]);
        api.respond(
            "api/recordings.html",
            r#"<recordings>
  <serverURL>http://localhost:8089/</serverURL>
  <imageURL>http://localhost:8089/upnp/thumbnails/video/</imageURL>
  <recording id="7" start="20230101200000" duration="014000" content="21">
    <channel>Das Erste HD</channel>
    <file>C:\Recordings\Tatort.ts</file>
    <title>Tatort</title>
    <info>S01E02 Der Fall</info>
    <desc>Krimi</desc>
    <image>7.jpg</image>
  </recording>
  <recording id="8" start="20221224200000" duration="013000">
    <channel>Arte</channel>
    <file>C:\Recordings\Film.ts</file>
    <title>Film</title>
    <image>8.jpg</image>
  </recording>
</recordings>"#,
        );
        let config = Config {
            path_substitution: Some(PathSubstitution {
                local: "C:\\Recordings".to_string(),
                remote: "\\\\nas\\recordings".to_string(),
            }),
            ..Config::default()
        };
        let clock = Arc::new(ManualClock::at(utc("2023-01-01T20:30:00Z")));
        let service = LiveTvService::new(&config, api.clone(), None, clock);

        let recordings = service.list_recordings(&CancellationToken::new()).await.unwrap();
        assert_eq!(recordings.len(), 2);

        let running = &recordings[0];
        assert_eq!(running.status, RecordingStatus::InProgress);
        assert_eq!(running.channel_id.as_deref(), Some("5"));
        assert_eq!(running.path, "\\\\nas\\recordings\\Tatort.ts");
        assert_eq!(running.episode_number, Some(2));
        assert_eq!(running.episode_title.as_deref(), Some("Der Fall"));
        assert_eq!(running.image_url, None);
        assert!(running.classification.is_series);

        let finished = &recordings[1];
        assert_eq!(finished.status, RecordingStatus::Completed);
        assert_eq!(finished.channel_id, None);
        assert_eq!(
            finished.image_url.as_deref(),
            Some("http://localhost:8089/upnp/thumbnails/video/8.jpg")
        );
    }

    #[tokio::test]
    async fn test_recording_without_matching_timer_start_is_completed() {
        // Timer schedule 19:55 + PreEPG 5 = 20:00; a file starting at 19:55 is not its recording
        let api = backend(&[timer_xml("1", "-1", "-1", "19:55:00", "50", "")]);
        api.respond(
            "api/recordings.html",
            r#"<recordings><recording id="7" start="20230101195500" duration="014500"><channel>Das Erste HD</channel><title>Tatort</title></recording></recordings>"#,
        );
        let clock = Arc::new(ManualClock::at(utc("2023-01-01T20:30:00Z")));
        let service = LiveTvService::new(&Config::default(), api, None, clock);

        let recordings = service.list_recordings(&CancellationToken::new()).await.unwrap();
        assert_eq!(recordings[0].status, RecordingStatus::Completed);
    }

    #[tokio::test]
    async fn test_delete_recording_stops_active_timer() {
        let api = backend(&[timer_xml("1", "-1", "-1", "19:55:00", "50", "")]);
        api.respond(
            "api/recordings.html",
            r#"<recordings><recording id="7" start="20230101200000" duration="014000"><channel>Das Erste HD</channel><title>Tatort</title></recording></recordings>"#,
        );
        let clock = Arc::new(ManualClock::at(utc("2023-01-01T20:30:00Z")));
        let service = LiveTvService::new(&Config::default(), api.clone(), None, clock);

        service.delete_recording("7", &CancellationToken::new()).await.unwrap();

        let disabled = api.queries("api/timeredit.html");
        assert_eq!(disabled[0].get("id").map(String::as_str), Some("1"));
        let deleted = &api.queries("api/recdelete.html")[0];
        assert_eq!(deleted.get("recid").map(String::as_str), Some("7"));
        assert_eq!(deleted.get("delfile").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn test_status_distinguishes_failures() {
        let api = backend(&[]);
        let service = service(api.clone(), Config::default());
        let cancel = CancellationToken::new();

        let status = service.status(&cancel).await;
        assert_eq!(status.status, BackendState::Ok);
        assert_eq!(status.version.as_deref(), Some("DVBViewer Media Server 2.1.6.0"));

        api.fail("api/getconfigfile.html", ServiceError::Authentication);
        assert_eq!(service.status(&cancel).await.status, BackendState::Unauthorized);

        api.fail("api/getconfigfile.html", ServiceError::Network("refused".to_string()));
        assert_eq!(service.status(&cancel).await.status, BackendState::Unreachable);
    }
}
