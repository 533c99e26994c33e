use chrono::Duration;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::cache::RefreshCell;
use super::clock::Clock;
use super::dvbviewer::{decode, ChannelGroupsDoc, ChannelsDoc, ImageUrlResolver, RemoteApi};
use crate::config::Config;
use crate::error::ServiceResult;
use crate::models::{Channel, ChannelGroup, ChannelGroupKey, ChannelSnapshot};

const CHANNELS_PATH: &str = "api/getchannelsxml.html";

/// Channel listings per group key, each behind its own cache cell
pub struct ChannelCatalog {
    api: Arc<dyn RemoteApi>,
    logos: Option<Arc<dyn ImageUrlResolver>>,
    favourites: bool,
    default_group: Option<String>,
    timer_group: Option<String>,
    default_cell: RefreshCell<ChannelSnapshot>,
    timer_cell: RefreshCell<ChannelSnapshot>,
}

impl ChannelCatalog {
    pub fn new(
        config: &Config,
        api: Arc<dyn RemoteApi>,
        logos: Option<Arc<dyn ImageUrlResolver>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ttl = Some(Duration::seconds(config.channel_cache_ttl_secs as i64));
        Self {
            api,
            logos,
            favourites: config.channel_favourites,
            default_group: config.default_channel_group.clone(),
            timer_group: config.timer_channel_group.clone(),
            default_cell: RefreshCell::new("channels_default", ttl, clock.clone()),
            timer_cell: RefreshCell::new("channels_timer", ttl, clock),
        }
    }

    /// Channel snapshot for `key`; `force_refresh` invalidates before reading
    pub async fn get(
        &self,
        key: ChannelGroupKey,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> ServiceResult<Arc<ChannelSnapshot>> {
        let cell = match key {
            ChannelGroupKey::Default => &self.default_cell,
            ChannelGroupKey::Timer => &self.timer_cell,
        };

        cell.get(force_refresh, || self.load(key, cancel)).await
    }

    /// Root channel groups, for configuring the default and timer groups
    pub async fn list_groups(&self, cancel: &CancellationToken) -> ServiceResult<Vec<ChannelGroup>> {
        let bytes = self
            .api
            .fetch(CHANNELS_PATH, &[("rootsonly", "1".to_string())], cancel)
            .await?;
        let doc: ChannelGroupsDoc = decode(&bytes)?;

        Ok(doc
            .roots
            .iter()
            .filter_map(|r| r.value())
            .map(|name| ChannelGroup {
                name: name.to_string(),
            })
            .collect())
    }

    fn query_for(&self, key: ChannelGroupKey) -> Vec<(&'static str, String)> {
        let group = match key {
            ChannelGroupKey::Timer if self.timer_group.is_some() => {
                return vec![
                    ("root", self.timer_group.clone().unwrap_or_default()),
                    ("logo", "1".to_string()),
                ];
            }
            _ => self.default_group.clone(),
        };

        if self.favourites {
            vec![("favonly", "1".to_string()), ("logo", "1".to_string())]
        } else if let Some(group) = group {
            vec![("root", group), ("logo", "1".to_string())]
        } else {
            vec![("logo", "1".to_string())]
        }
    }

    async fn load(
        &self,
        key: ChannelGroupKey,
        cancel: &CancellationToken,
    ) -> ServiceResult<ChannelSnapshot> {
        let bytes = self
            .api
            .fetch(CHANNELS_PATH, &self.query_for(key), cancel)
            .await?;
        let doc: ChannelsDoc = decode(&bytes)?;

        let mut channels: Vec<Channel> = Vec::new();
        for (group, raw) in doc.flatten() {
            let Some(id) = raw.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
                warn!("Skipping channel without ID: {:?}", raw.name);
                continue;
            };
            if channels.iter().any(|c| c.id == id) {
                debug!("Channel {} listed in more than one group", id);
                continue;
            }

            let logo_ref = raw.logo.clone().filter(|l| !l.trim().is_empty());
            channels.push(Channel {
                id: id.to_string(),
                epg_id: raw.epg_id.clone().unwrap_or_default(),
                number: channels.len() as u32 + 1,
                name: raw.name.clone().unwrap_or_default(),
                logo_url: match (&self.logos, &logo_ref) {
                    (Some(resolver), Some(logo)) => resolver.channel_logo(logo),
                    _ => None,
                },
                logo_ref,
                is_radio: !decode_video_flag(raw.flags.as_deref().unwrap_or_default()),
                group_name: group.map(String::from),
            });
        }

        tracing::info!(
            group = key.as_str(),
            "Loaded {} channels from DVBViewer",
            channels.len()
        );
        Ok(ChannelSnapshot::new(channels))
    }
}

/// True when the channel carries video.
///
/// The flag is read as a binary string; the fourth character from the end is the
/// video bit. Anything undecodable counts as video, matching what the backend's
/// own clients assume for unknown channels.
pub fn decode_video_flag(flags: &str) -> bool {
    let Ok(value) = flags.trim().parse::<i64>() else {
        error!("DVBViewer channel flag: '{}', videoflag: unknown", flags);
        return true;
    };

    let binary = format!("{:b}", value);
    match binary.len().checked_sub(4).and_then(|i| binary.chars().nth(i)) {
        Some(bit) => bit == '1',
        None => {
            error!(
                "DVBViewer channel flag: {}, binary: {}, videoflag: unknown",
                value, binary
            );
            true
        }
    }
}
