//! Events published by the station to the display layer

use crate::engine::TrackMetadata;
use crate::recorder::RecordingIntent;
use serde::{Deserialize, Serialize};

/// A status message and whether it reports an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLine {
    pub text: String,
    pub error: bool,
}

impl StatusLine {
    pub fn new(text: impl Into<String>, error: bool) -> Self {
        Self {
            text: text.into(),
            error,
        }
    }
}

/// Everything the display layer needs to mirror
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StationEvent {
    Status(StatusLine),
    /// On-air indicator
    OnAir(bool),
    /// Record indicator
    Recording(RecordingIntent),
    /// Recording timer text, `+MM:SS` or `00:00:00`
    RecTimer(String),
    /// Selected channel
    Channel(String),
    NowPlaying(TrackMetadata),
    /// `[HH:MM:SS] [channel] Artist — Title`
    History(String),
    /// A line just appended to the tape log
    RecLog(String),
}
