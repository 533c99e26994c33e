//! Version-aware decoding of backend documents
//!
//! Service versions disagree on element names for some entities. The dialect is
//! detected once from the settings `Version` entry and picks the decoder; every
//! decoder yields the same normalized record.

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::client::RemoteApi;
use super::types::{LegacySearchesDoc, SearchesDoc, SettingsDoc};
use crate::error::{ServiceError, ServiceResult};

lazy_static! {
    static ref SERVICE_VERSION: Regex = Regex::new(r"\bV(\d+)\.(\d+)").unwrap();
}

const LAST_LEGACY_VERSION: (u32, u32) = (1, 32);

/// API flavour spoken by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiDialect {
    /// Recording service 1.x
    Legacy,
    Current,
}

impl ApiDialect {
    /// Recording Service releases up to V1.32 speak the legacy API; anything newer,
    /// or a version string without a `V<major>.<minor>` token, is current
    pub fn detect(version: &str) -> Self {
        let Some(caps) = SERVICE_VERSION.captures(version) else {
            return ApiDialect::Current;
        };
        let major: u32 = caps[1].parse().unwrap_or(u32::MAX);
        let minor: u32 = caps[2].parse().unwrap_or(u32::MAX);

        if (major, minor) <= LAST_LEGACY_VERSION {
            ApiDialect::Legacy
        } else {
            ApiDialect::Current
        }
    }

    /// Parameter carrying the channel id on `timeradd.html`
    pub fn timer_channel_param(&self) -> &'static str {
        match self {
            ApiDialect::Legacy => "channel",
            ApiDialect::Current => "ch",
        }
    }
}

/// Decode an XML body into `T`
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ServiceResult<T> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');

    if text.trim().is_empty() {
        return Err(ServiceError::Decode("empty response".to_string()));
    }

    quick_xml::de::from_str(text).map_err(|e| {
        error!("Failed to decode DVBViewer response: {}", e);
        debug!("Response text: {}", text.chars().take(500).collect::<String>());
        ServiceError::from(e)
    })
}

/// Normalized recurring search, whatever the service version
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchEntry {
    pub name: String,
    pub series: Option<String>,
    pub search_phrase: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub epg_before: Option<String>,
    pub epg_after: Option<String>,
    pub days: Option<String>,
    pub channels: Vec<String>,
    pub priority: Option<String>,
    pub auto_recording: Option<String>,
    pub check_rec_title: Option<String>,
    pub check_rec_subtitle: Option<String>,
    pub check_timer: Option<String>,
}

pub fn decode_searches(bytes: &[u8], dialect: ApiDialect) -> ServiceResult<Vec<SearchEntry>> {
    match dialect {
        ApiDialect::Current => {
            let doc: SearchesDoc = decode(bytes)?;
            Ok(doc
                .searches
                .into_iter()
                .map(|s| SearchEntry {
                    name: s.name,
                    series: s.series,
                    search_phrase: s.search_phrase,
                    start_time: s.start_time,
                    end_time: s.end_time,
                    epg_before: s.epg_before,
                    epg_after: s.epg_after,
                    days: s.days,
                    channels: s.channels.map(|c| c.channel).unwrap_or_default(),
                    priority: s.priority,
                    auto_recording: s.auto_recording,
                    check_rec_title: s.check_rec_title,
                    check_rec_subtitle: s.check_rec_subtitle,
                    check_timer: s.check_timer,
                })
                .collect())
        }
        ApiDialect::Legacy => {
            let doc: LegacySearchesDoc = decode(bytes)?;
            Ok(doc
                .searches
                .into_iter()
                .map(|s| SearchEntry {
                    name: s.name,
                    series: s.series,
                    search_phrase: s.search_phrase,
                    start_time: s.start_time,
                    end_time: s.end_time,
                    epg_before: s.epg_before,
                    epg_after: s.epg_after,
                    days: s.days,
                    channels: s.channels.map(|c| c.channel).unwrap_or_default(),
                    priority: None,
                    auto_recording: s.auto_recording,
                    check_rec_title: s.check_rec_title,
                    check_rec_subtitle: s.check_rec_subtitle,
                    check_timer: s.check_timer,
                })
                .collect())
        }
    }
}

const SETTINGS_PATH: &str = "api/getconfigfile.html";

/// Reads the service version and remembers the detected dialect
pub struct VersionDetector {
    api: Arc<dyn RemoteApi>,
    detected: RwLock<Option<ApiDialect>>,
}

impl VersionDetector {
    pub fn new(api: Arc<dyn RemoteApi>) -> Self {
        Self {
            api,
            detected: RwLock::new(None),
        }
    }

    /// Fetch the version string; also records the dialect
    pub async fn fetch_version(&self, cancel: &CancellationToken) -> ServiceResult<String> {
        let bytes = self
            .api
            .fetch(
                SETTINGS_PATH,
                &[("file", "config\\service.xml".to_string())],
                cancel,
            )
            .await?;
        let settings: SettingsDoc = decode(&bytes)?;
        let version = settings.version().unwrap_or_default().to_string();

        let dialect = ApiDialect::detect(&version);
        let previous = self.detected.write().await.replace(dialect);
        if previous != Some(dialect) {
            info!("DVBViewer service version '{}' ({:?} API)", version, dialect);
        }

        Ok(version)
    }

    /// Detected dialect; asks the backend on first use. When that fails the
    /// `Current` fallback is remembered too, until `fetch_version` succeeds.
    pub async fn dialect(&self, cancel: &CancellationToken) -> ApiDialect {
        if let Some(dialect) = *self.detected.read().await {
            return dialect;
        }

        match self.fetch_version(cancel).await {
            Ok(version) => ApiDialect::detect(&version),
            Err(ServiceError::Cancelled) => ApiDialect::Current,
            Err(e) => {
                warn!("Version lookup failed, assuming current API: {}", e);
                self.detected
                    .write()
                    .await
                    .get_or_insert(ApiDialect::Current);
                ApiDialect::Current
            }
        }
    }
}
