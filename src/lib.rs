pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::services::live_tv::LiveTvService;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub live_tv: Arc<LiveTvService>,
    pub start_time: Instant,
}
