use chrono::{DateTime, Utc};
use serde::Serialize;

/// Which remote channel query a snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelGroupKey {
    /// Channels shown to the host (favourites or the configured default group)
    Default,
    /// Channels the backend uses when it reports timers
    Timer,
}

impl ChannelGroupKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelGroupKey::Default => "default",
            ChannelGroupKey::Timer => "timer",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub epg_id: String,
    pub number: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub is_radio: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

/// One immutable channel listing, replaced wholesale on refresh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSnapshot {
    pub channels: Vec<Channel>,
}

impl ChannelSnapshot {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    pub fn by_id(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn by_epg_id(&self, epg_id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.epg_id == epg_id)
    }

    /// Recordings only carry the channel name
    pub fn by_name(&self, name: &str) -> Option<&Channel> {
        let name = name.trim().to_lowercase();
        self.channels
            .iter()
            .find(|c| c.name.trim().to_lowercase() == name)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelGroup {
    pub name: String,
}

/// Genre flags and display labels derived from a content signal
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub genres: Vec<String>,
    pub is_movie: bool,
    pub is_series: bool,
    pub is_sports: bool,
    pub is_news: bool,
    pub is_kids: bool,
    pub is_live: bool,
    pub is_premiere: bool,
}

/// A guide entry; built per query and never cached
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: String,
    pub channel_id: String,
    pub channel_epg_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_code: Option<String>,
    pub start_utc: DateTime<Utc>,
    pub stop_utc: DateTime<Utc>,
    #[serde(flatten)]
    pub classification: Classification,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: &str, epg: &str, name: &str) -> Channel {
        Channel {
            id: id.to_string(),
            epg_id: epg.to_string(),
            number: 0,
            name: name.to_string(),
            logo_ref: None,
            logo_url: None,
            is_radio: false,
            group_name: None,
        }
    }

    #[test]
    fn test_snapshot_lookups() {
        let snapshot = ChannelSnapshot::new(vec![
            channel("5", "100", "Das Erste HD"),
            channel("6", "200", "ZDF HD"),
        ]);

        assert_eq!(snapshot.by_id("6").map(|c| c.epg_id.as_str()), Some("200"));
        assert_eq!(snapshot.by_epg_id("100").map(|c| c.id.as_str()), Some("5"));
        assert_eq!(snapshot.by_name("das erste hd").map(|c| c.id.as_str()), Some("5"));
        assert!(snapshot.by_id("7").is_none());
    }
}
