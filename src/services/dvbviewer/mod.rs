//! DVBViewer Recording Service integration
//!
//! This module talks to the recording service web API (`api/*.html`), which answers
//! every request with an XML document.
//!
//! # Overview
//!
//! - **Client**: authenticated GET requests with cancellation
//! - **Types**: raw XML shapes as the backend sends them
//! - **Decoder**: version-aware decoding into one normalized record per entity
//! - **Dates**: the backend's Delphi date encoding and local time formats
//!
//! # Request shape
//!
//! ```text
//! http://host:8089/api/timerlist.html?utf8=2
//! http://host:8089/api/epg.html?lvl=2&channel=100&start=44927.83333333&end=44927.89583333
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::services::dvbviewer::{decode, DvbViewerClient, RemoteApi, TimersDoc};
//!
//! let client = DvbViewerClient::new(&config)?;
//! let bytes = client.fetch("api/timerlist.html", &[("utf8", "2".into())], &cancel).await?;
//! let timers: TimersDoc = decode(&bytes)?;
//! ```

pub mod client;
pub mod dates;
pub mod decoder;
pub mod types;

// Re-exports for convenience
pub use client::{DvbViewerClient, ImageUrlResolver, Query, RemoteApi};
pub use decoder::{decode, decode_searches, ApiDialect, SearchEntry, VersionDetector};
pub use types::{
    ChannelGroupsDoc, ChannelsDoc, GuideDoc, RawChannel, RawProgramme, RawRecording, RawTimer,
    RecordingsDoc, SettingsDoc, TimersDoc,
};
