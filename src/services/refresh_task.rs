//! Periodic schedule refresh
//!
//! Runs as a background task on startup, then periodically.
//! - Reloads series timers and timers
//! - Removes series timers whose guide entry is gone
//! - Optionally disables timers for episodes that are already recorded

use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::coordinator::RefreshCoordinator;
use super::library::{LibraryLookup, LibraryMatcher};
use super::recordings::RecordingCatalog;
use crate::config::{Config, LibraryProfile};

/// Configuration for the refresh task
pub struct RefreshTaskConfig {
    /// How often to refresh (in seconds)
    pub interval_secs: u64,
    pub skip_already_in_library: bool,
    pub library_profile: LibraryProfile,
}

impl From<&Config> for RefreshTaskConfig {
    fn from(config: &Config) -> Self {
        Self {
            interval_secs: config.refresh_interval_secs.max(1),
            skip_already_in_library: config.skip_already_in_library,
            library_profile: config.library_profile,
        }
    }
}

/// Result of a refresh cycle
#[derive(Debug, Default)]
pub struct RefreshResult {
    pub refreshed: bool,
    pub timers_suppressed: usize,
    pub errors: Vec<String>,
}

impl RefreshResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run a single refresh cycle
pub async fn run_refresh(
    coordinator: &RefreshCoordinator,
    recordings: &RecordingCatalog,
    config: &RefreshTaskConfig,
    cancel: &CancellationToken,
) -> RefreshResult {
    let mut result = RefreshResult::default();

    match coordinator.refresh_all(cancel).await {
        Ok(()) => result.refreshed = true,
        Err(e) => {
            result.errors.push(format!("Schedule refresh failed: {}", e));
            tracing::error!("Refresh: schedule refresh failed: {}", e);
            return result;
        }
    }

    // Orphan cleanup always runs; the library check only when enabled
    let library = if config.skip_already_in_library {
        match recordings.library(cancel).await {
            Ok(library) => Some(library),
            Err(e) => {
                result.errors.push(format!("Recordings unavailable: {}", e));
                tracing::error!("Refresh: recordings unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let matcher = LibraryMatcher::new(config.library_profile);
    let lookup = library
        .as_ref()
        .map(|library| (&matcher, library as &dyn LibraryLookup));
    match coordinator.suppress_duplicates(lookup, cancel).await {
        Ok(count) => {
            result.timers_suppressed = count;
            if count > 0 {
                tracing::info!("Refresh: suppressed {} timers", count);
            }
        }
        Err(e) => {
            result.errors.push(format!("Timer suppression failed: {}", e));
            tracing::error!("Refresh: timer suppression failed: {}", e);
        }
    }

    result
}

/// Start the background refresh task
///
/// Runs immediately on startup, then at the configured interval until `shutdown`
/// is cancelled. Spawn with `tokio::spawn`.
pub async fn start_refresh_task(
    coordinator: Arc<RefreshCoordinator>,
    recordings: Arc<RecordingCatalog>,
    config: RefreshTaskConfig,
    shutdown: CancellationToken,
) {
    tracing::info!(
        "Starting refresh task (interval: {}s, skip_in_library: {})",
        config.interval_secs,
        config.skip_already_in_library
    );

    let mut interval = time::interval(Duration::from_secs(config.interval_secs));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Refresh task stopped");
                return;
            }
            _ = interval.tick() => {}
        }

        let result = run_refresh(&coordinator, &recordings, &config, &shutdown).await;
        if !result.is_success() {
            for error in &result.errors {
                tracing::warn!("Refresh error: {}", error);
            }
        }
    }
}
