//! Raw XML documents returned by the recording service
//!
//! Everything numeric is kept as text here; the backend is inconsistent about
//! empty attributes and flag spellings, so parsing happens during normalization.

use serde::Deserialize;

// ============================================================================
// Channels
// ============================================================================

/// `api/getchannelsxml.html`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelsDoc {
    #[serde(rename = "root", default)]
    pub roots: Vec<RawRoot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRoot {
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
    #[serde(rename = "group", default)]
    pub groups: Vec<RawGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGroup {
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
    #[serde(rename = "channel", default)]
    pub channels: Vec<RawChannel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawChannel {
    #[serde(rename = "@ID", default)]
    pub id: Option<String>,
    #[serde(rename = "@EPGID", default)]
    pub epg_id: Option<String>,
    #[serde(rename = "@nr", default)]
    pub nr: Option<String>,
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
    #[serde(rename = "@flags", default)]
    pub flags: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

impl ChannelsDoc {
    /// Channels in document order with the name of the group that holds them
    pub fn flatten(&self) -> impl Iterator<Item = (Option<&str>, &RawChannel)> {
        self.roots.iter().flat_map(|root| {
            root.groups.iter().flat_map(|group| {
                group
                    .channels
                    .iter()
                    .map(move |channel| (group.name.as_deref(), channel))
            })
        })
    }
}

/// `api/getchannelsxml.html?rootsonly=1`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelGroupsDoc {
    #[serde(rename = "root", default)]
    pub roots: Vec<RawRootName>,
}

/// Older services put the group name in the text, newer ones in `name`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRootName {
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
    #[serde(rename = "$text", default)]
    pub text: Option<String>,
}

impl RawRootName {
    pub fn value(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.text.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// ============================================================================
// Guide
// ============================================================================

/// `api/epg.html?lvl=2`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuideDoc {
    #[serde(rename = "@Ver", default)]
    pub version: Option<String>,
    #[serde(rename = "programme", default)]
    pub programmes: Vec<RawProgramme>,
}

/// Text element with an optional language attribute
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LangText {
    #[serde(rename = "@lng", default)]
    pub lang: Option<String>,
    #[serde(rename = "$text", default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTitles {
    #[serde(rename = "title", default)]
    pub items: Vec<LangText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvents {
    #[serde(rename = "event", default)]
    pub items: Vec<LangText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDescriptions {
    #[serde(rename = "description", default)]
    pub items: Vec<LangText>,
}

/// A guide entry. Level 2 responses nest texts under `titles`/`events`/`descriptions`,
/// older services put `title`/`event`/`description` directly under `programme`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProgramme {
    #[serde(rename = "@start", default)]
    pub start: String,
    #[serde(rename = "@stop", default)]
    pub stop: String,
    #[serde(rename = "@channel", default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub eventid: Option<String>,
    #[serde(default)]
    pub titles: Option<RawTitles>,
    #[serde(rename = "title", default)]
    pub title: Vec<LangText>,
    #[serde(default)]
    pub events: Option<RawEvents>,
    #[serde(rename = "event", default)]
    pub event: Vec<LangText>,
    #[serde(default)]
    pub descriptions: Option<RawDescriptions>,
    #[serde(rename = "description", default)]
    pub description: Vec<LangText>,
    #[serde(default)]
    pub content: Option<String>,
}

fn first_text(nested: Option<&[LangText]>, flat: &[LangText]) -> Option<String> {
    nested
        .and_then(|items| items.first())
        .or_else(|| flat.first())
        .and_then(|t| t.text.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

impl RawProgramme {
    pub fn name(&self) -> Option<String> {
        first_text(self.titles.as_ref().map(|t| t.items.as_slice()), &self.title)
    }

    pub fn subtitle(&self) -> Option<String> {
        first_text(self.events.as_ref().map(|e| e.items.as_slice()), &self.event)
    }

    pub fn overview(&self) -> Option<String> {
        first_text(
            self.descriptions.as_ref().map(|d| d.items.as_slice()),
            &self.description,
        )
    }
}

// ============================================================================
// Timers
// ============================================================================

/// `api/timerlist.html?utf8=2`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimersDoc {
    #[serde(rename = "Timer", default)]
    pub timers: Vec<RawTimer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTimer {
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
    #[serde(rename = "Descr", default)]
    pub description: Option<String>,
    #[serde(rename = "@Enabled", default)]
    pub enabled: Option<String>,
    #[serde(rename = "Executeable", default)]
    pub executeable: Option<String>,
    #[serde(rename = "Recording", default)]
    pub recording: Option<String>,
    #[serde(rename = "@Days", default)]
    pub days: Option<String>,
    #[serde(rename = "@Date", default)]
    pub date: String,
    #[serde(rename = "@Start", default)]
    pub start: String,
    #[serde(rename = "@Dur", default)]
    pub duration: Option<String>,
    #[serde(rename = "@End", default)]
    pub end: Option<String>,
    #[serde(rename = "@PreEPG", default)]
    pub pre_epg: Option<String>,
    #[serde(rename = "@PostEPG", default)]
    pub post_epg: Option<String>,
    #[serde(rename = "@Priority", default)]
    pub priority: Option<String>,
    #[serde(rename = "Series", default)]
    pub series: Option<String>,
    #[serde(rename = "Channel", default)]
    pub channel: Option<RawTimerChannel>,
}

/// `ID` is "{channel id}|{channel name}"
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTimerChannel {
    #[serde(rename = "@ID", default)]
    pub id: Option<String>,
}

impl RawTimer {
    pub fn channel_id(&self) -> Option<&str> {
        self.channel
            .as_ref()
            .and_then(|c| c.id.as_deref())
            .and_then(|id| id.split('|').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Repeating timers carry a weekday pattern such as "T-T----"
    pub fn is_one_time(&self) -> bool {
        match self.days.as_deref() {
            None => true,
            Some(days) => days.trim().chars().all(|c| c == '-'),
        }
    }
}

// ============================================================================
// Searches
// ============================================================================

/// `api/searchlist.html`, current services
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchesDoc {
    #[serde(rename = "Search", default)]
    pub searches: Vec<RawSearch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSearch {
    #[serde(rename = "@Name", default)]
    pub name: String,
    #[serde(rename = "@AutoRecording", default)]
    pub auto_recording: Option<String>,
    #[serde(rename = "@CheckRecTitle", default)]
    pub check_rec_title: Option<String>,
    #[serde(rename = "@CheckRecSubTitle", default)]
    pub check_rec_subtitle: Option<String>,
    #[serde(rename = "@CheckTimer", default)]
    pub check_timer: Option<String>,
    #[serde(rename = "Priority", default)]
    pub priority: Option<String>,
    #[serde(rename = "Series", default)]
    pub series: Option<String>,
    #[serde(rename = "SearchPhrase", default)]
    pub search_phrase: Option<String>,
    #[serde(rename = "StartTime", default)]
    pub start_time: Option<String>,
    #[serde(rename = "EndTime", default)]
    pub end_time: Option<String>,
    #[serde(rename = "EPGBefore", default)]
    pub epg_before: Option<String>,
    #[serde(rename = "EPGAfter", default)]
    pub epg_after: Option<String>,
    #[serde(rename = "Days", default)]
    pub days: Option<String>,
    #[serde(rename = "Channels", default)]
    pub channels: Option<RawSearchChannels>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSearchChannels {
    #[serde(rename = "Channel", default)]
    pub channel: Vec<String>,
}

/// `api/searchlist.html`, 1.x services (lower-case element names, no priority)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacySearchesDoc {
    #[serde(rename = "Search", default)]
    pub searches: Vec<RawLegacySearch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLegacySearch {
    #[serde(rename = "@Name", default)]
    pub name: String,
    #[serde(rename = "@Autorecording", default)]
    pub auto_recording: Option<String>,
    #[serde(rename = "@CheckRecTitle", default)]
    pub check_rec_title: Option<String>,
    #[serde(rename = "@CheckRecSubTitle", default)]
    pub check_rec_subtitle: Option<String>,
    #[serde(rename = "@CheckTimer", default)]
    pub check_timer: Option<String>,
    #[serde(rename = "Series", default)]
    pub series: Option<String>,
    #[serde(rename = "searchphrase", default)]
    pub search_phrase: Option<String>,
    #[serde(rename = "Starttime", default)]
    pub start_time: Option<String>,
    #[serde(rename = "EndTime", default)]
    pub end_time: Option<String>,
    #[serde(rename = "EPGBefore", default)]
    pub epg_before: Option<String>,
    #[serde(rename = "EPGAfter", default)]
    pub epg_after: Option<String>,
    #[serde(rename = "Days", default)]
    pub days: Option<String>,
    #[serde(rename = "channels", default)]
    pub channels: Option<RawLegacySearchChannels>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLegacySearchChannels {
    #[serde(rename = "channel", default)]
    pub channel: Vec<String>,
}

// ============================================================================
// Recordings
// ============================================================================

/// `api/recordings.html?utf8=1&images=1`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordingsDoc {
    #[serde(rename = "serverURL", default)]
    pub server_url: Option<String>,
    #[serde(rename = "imageURL", default)]
    pub image_url: Option<String>,
    #[serde(rename = "recording", default)]
    pub recordings: Vec<RawRecording>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecording {
    #[serde(rename = "@id", default)]
    pub id: String,
    #[serde(rename = "@start", default)]
    pub start: String,
    /// HHmmss
    #[serde(rename = "@duration", default)]
    pub duration: String,
    #[serde(rename = "@content", default)]
    pub content: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

// ============================================================================
// Settings
// ============================================================================

/// `api/getconfigfile.html?file=config\service.xml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsDoc {
    #[serde(rename = "section", default)]
    pub sections: Vec<RawSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSection {
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
    #[serde(rename = "entry", default)]
    pub entries: Vec<RawEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "$text", default)]
    pub text: Option<String>,
}

impl SettingsDoc {
    pub fn entry(&self, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .flat_map(|s| s.entries.iter())
            .find(|e| e.name == key)
            .and_then(|e| e.text.as_deref())
            .map(str::trim)
    }

    pub fn version(&self) -> Option<&str> {
        self.entry("Version")
    }
}
