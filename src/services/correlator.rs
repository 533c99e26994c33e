use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::guide::GuideReader;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Channel, Program, TimerRecord};

/// Attaches guide data to sparsely described backend timers
pub struct ScheduleCorrelator {
    guide: Arc<GuideReader>,
}

impl ScheduleCorrelator {
    pub fn new(guide: Arc<GuideReader>) -> Self {
        Self { guide }
    }

    /// Program starting exactly at `start`
    pub fn find_match(programs: &[Program], start: DateTime<Utc>) -> Option<&Program> {
        programs.iter().find(|p| p.start_utc == start)
    }

    pub fn enrich(timer: &mut TimerRecord, program: &Program) {
        timer.program_id = Some(program.id.clone());
        timer.series_name = program.name.clone();
        timer.name = match (&program.episode_title, program.episode_number) {
            (Some(title), Some(_)) => format!("{} - {}", program.name, title),
            _ => program.name.clone(),
        };
        timer.episode_title = program.episode_title.clone();
        timer.season_number = program.season_number;
        timer.episode_number = program.episode_number;
        if program.overview.is_some() {
            timer.overview = program.overview.clone();
        }
        timer.genres = program.classification.genres.clone();
    }

    /// Look the timer up in the guide and enrich it on a hit.
    ///
    /// A miss, or a guide error other than cancellation, leaves the timer as the
    /// backend described it. Returns whether a program was attached.
    pub async fn correlate(
        &self,
        timer: &mut TimerRecord,
        channel: &Channel,
        cancel: &CancellationToken,
    ) -> ServiceResult<bool> {
        let programs = match self
            .guide
            .programs(channel, timer.start_utc, timer.end_utc, cancel)
            .await
        {
            Ok(programs) => programs,
            Err(ServiceError::Cancelled) => return Err(ServiceError::Cancelled),
            Err(e) => {
                warn!(timer = %timer.id, "Guide lookup failed: {}", e);
                return Ok(false);
            }
        };

        match Self::find_match(&programs, timer.start_utc) {
            Some(program) => {
                Self::enrich(timer, program);
                Ok(true)
            }
            None => {
                debug!(timer = %timer.id, "No guide entry at {}", timer.start_utc);
                Ok(false)
            }
        }
    }
}
