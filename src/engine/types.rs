//! Engine-facing data types
//!
//! The coarse state and metadata the core reads from the media engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Artist reported when the stream carries no artist tag
pub const UNKNOWN_ARTIST: &str = "Unknown";

/// Title reported when the stream carries no metadata yet
pub const EMPTY_TITLE: &str = "—";

/// Coarse state of the media engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerState {
    #[default]
    NothingSpecial,
    Opening,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

impl PlayerState {
    /// Map the engine's raw integer state; anything unrecognised is `Error`
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => PlayerState::NothingSpecial,
            1 => PlayerState::Opening,
            2 => PlayerState::Buffering,
            3 => PlayerState::Playing,
            4 => PlayerState::Paused,
            5 => PlayerState::Stopped,
            6 => PlayerState::Ended,
            _ => PlayerState::Error,
        }
    }

    /// States that mean "still connecting, not lost"
    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            PlayerState::Opening | PlayerState::Buffering | PlayerState::Paused
        )
    }

    /// States that, if they persist, mean the stream is gone
    pub fn is_lost(&self) -> bool {
        matches!(
            self,
            PlayerState::NothingSpecial
                | PlayerState::Stopped
                | PlayerState::Ended
                | PlayerState::Error
        )
    }

    /// States in which the engine is pulling the stream
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlayerState::Opening | PlayerState::Buffering | PlayerState::Playing
        )
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerState::NothingSpecial => "NothingSpecial",
            PlayerState::Opening => "Opening",
            PlayerState::Buffering => "Buffering",
            PlayerState::Playing => "Playing",
            PlayerState::Paused => "Paused",
            PlayerState::Stopped => "Stopped",
            PlayerState::Ended => "Ended",
            PlayerState::Error => "Error",
        };
        write!(f, "{}", name)
    }
}

/// Artist and title as polled from the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub artist: String,
    pub title: String,
}

impl TrackMetadata {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }

    /// Placeholder used before any metadata arrives
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_ARTIST, EMPTY_TITLE)
    }

    /// Build from raw tags, splitting a `Artist - Title` now-playing string
    ///
    /// Explicit artist/title tags win over the now-playing split.
    pub fn from_tags(artist: Option<&str>, title: Option<&str>, now_playing: Option<&str>) -> Self {
        let clean = |s: Option<&str>| s.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        let mut artist = clean(artist);
        let mut title = clean(title);

        if let Some(now_playing) = clean(now_playing) {
            match now_playing.split_once(" - ") {
                Some((a, t)) => {
                    artist = artist.or_else(|| Some(a.trim().to_string()));
                    title = title.or_else(|| Some(t.trim().to_string()));
                }
                None => title = title.or(Some(now_playing)),
            }
        }

        Self {
            artist: artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            title: title.unwrap_or_else(|| EMPTY_TITLE.to_string()),
        }
    }

    pub fn has_unknown_artist(&self) -> bool {
        self.artist == UNKNOWN_ARTIST
    }

    /// True while the stream has not delivered a title
    pub fn is_empty(&self) -> bool {
        self.title == EMPTY_TITLE
    }
}

impl Default for TrackMetadata {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Media options handed to the engine alongside a URL
///
/// The engine receives them as opaque `:key=value` strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaOptions {
    options: Vec<String>,
}

impl MediaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a User-Agent on the HTTP request
    pub fn user_agent(mut self, agent: &str) -> Self {
        self.options.push(format!(":http-user-agent={}", agent));
        self
    }

    /// Network and live caching, in milliseconds
    pub fn caching(mut self, cache_ms: u64) -> Self {
        self.options.push(format!(":network-caching={}", cache_ms));
        self.options.push(format!(":live-caching={}", cache_ms));
        self
    }

    pub fn as_slice(&self) -> &[String] {
        &self.options
    }

    pub fn into_vec(self) -> Vec<String> {
        self.options
    }
}
