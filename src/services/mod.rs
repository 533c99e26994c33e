pub mod cache;
pub mod channels;
pub mod classifier;
pub mod clock;
pub mod coordinator;
pub mod correlator;
pub mod dvbviewer;
pub mod guide;
pub mod library;
pub mod live_tv;
pub mod recordings;
pub mod refresh_task;
pub mod series_timers;
pub mod timers;
pub mod titles;

#[cfg(test)]
pub mod testing;
