use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::classifier::GenreClassifier;
use super::dvbviewer::dates::{delphi_float, parse_program_time};
use super::dvbviewer::{decode, GuideDoc, RawProgramme, RemoteApi};
use super::titles;
use crate::error::ServiceResult;
use crate::models::{Channel, Program};

const EPG_PATH: &str = "api/epg.html";

/// Guide queries; never cached
pub struct GuideReader {
    api: Arc<dyn RemoteApi>,
    classifier: Arc<GenreClassifier>,
    tz: Tz,
}

impl GuideReader {
    pub fn new(api: Arc<dyn RemoteApi>, classifier: Arc<GenreClassifier>, tz: Tz) -> Self {
        Self { api, classifier, tz }
    }

    /// Programs on `channel` overlapping `[start, end]`
    pub async fn programs(
        &self,
        channel: &Channel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<Program>> {
        let query = [
            ("lvl", "2".to_string()),
            ("channel", channel.epg_id.clone()),
            ("start", delphi_float(start, self.tz)),
            ("end", delphi_float(end, self.tz)),
        ];
        let bytes = self.api.fetch(EPG_PATH, &query, cancel).await?;
        let doc: GuideDoc = decode(&bytes)?;

        let programs: Vec<Program> = doc
            .programmes
            .iter()
            .filter_map(|raw| self.normalize(channel, raw))
            .collect();

        debug!(
            channel = %channel.id,
            "Guide returned {} programs",
            programs.len()
        );
        Ok(programs)
    }

    fn normalize(&self, channel: &Channel, raw: &RawProgramme) -> Option<Program> {
        let (Some(start_utc), Some(stop_utc)) = (
            parse_program_time(&raw.start, self.tz),
            parse_program_time(&raw.stop, self.tz),
        ) else {
            warn!(
                channel = %channel.id,
                "Skipping programme with unreadable times: {} - {}",
                raw.start, raw.stop
            );
            return None;
        };

        let name = raw.name().unwrap_or_default();
        let subtitle = raw.subtitle();
        let episode = subtitle
            .as_deref()
            .map(titles::extract_episode)
            .unwrap_or_default();
        let overview = raw.overview();
        let content_code = raw
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from);

        let classification = self.classifier.classify(
            content_code.as_deref(),
            overview.as_deref(),
            episode.has_episode(),
        );

        Some(Program {
            id: format!("{}|{}|{}", channel.id, raw.start, raw.stop),
            channel_id: channel.id.clone(),
            channel_epg_id: channel.epg_id.clone(),
            production_year: titles::extract_year(&name, subtitle.as_deref()),
            episode_title: episode.clean_subtitle.filter(|s| *s != name),
            season_number: episode.season,
            episode_number: episode.episode,
            name,
            overview,
            content_code,
            start_utc,
            stop_utc,
            classification,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenreConfig;
    use crate::services::testing::FakeApi;

    fn channel() -> Channel {
        Channel {
            id: "5".to_string(),
            epg_id: "100".to_string(),
            number: 1,
            name: "Das Erste HD".to_string(),
            logo_ref: None,
            logo_url: None,
            is_radio: false,
            group_name: None,
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn reader(api: Arc<FakeApi>) -> GuideReader {
        GuideReader::new(
            api,
            Arc::new(GenreClassifier::new(GenreConfig::coded_defaults())),
            Tz::UTC,
        )
    }

    #[tokio::test]
    async fn test_programs_are_normalized() {
        let api = Arc::new(FakeApi::new());
        api.respond(
            EPG_PATH,
            r#"<?xml version="1.0" encoding="utf-8"?>
<epg Ver="2">
  <programme start="20230101200000" stop="20230101211500" channel="100">
    <eventid>42</eventid>
    <titles><title>Tatort</title></titles>
    <events><event>S12E05 Der Fall</event></events>
    <descriptions><description>Krimi</description></descriptions>
    <content>21</content>
  </programme>
  <programme start="broken" stop="20230101230000" channel="100">
    <titles><title>Kaputt</title></titles>
  </programme>
</epg>"#,
        );

        let programs = reader(api.clone())
            .programs(
                &channel(),
                utc("2023-01-01T19:00:00Z"),
                utc("2023-01-01T23:00:00Z"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(programs.len(), 1);
        let program = &programs[0];
        assert_eq!(program.id, "5|20230101200000|20230101211500");
        assert_eq!(program.name, "Tatort");
        assert_eq!(program.episode_title.as_deref(), Some("Der Fall"));
        assert_eq!(program.season_number, Some(12));
        assert_eq!(program.episode_number, Some(5));
        assert_eq!(program.start_utc, utc("2023-01-01T20:00:00Z"));
        assert!(program.classification.is_series);

        let query = &api.queries(EPG_PATH)[0];
        assert_eq!(query.get("channel").map(String::as_str), Some("100"));
        assert_eq!(query.get("start").map(String::as_str), Some("44927.79166667"));
        assert_eq!(query.get("lvl").map(String::as_str), Some("2"));
    }
}
