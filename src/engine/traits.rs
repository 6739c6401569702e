//! Media engine contract
//!
//! The playback engine is a black box. The core drives it through these
//! calls and only ever observes it by polling.

use super::types::{PlayerState, TrackMetadata};

/// Control surface of the external streaming media engine
pub trait StreamEngine: Send {
    /// Start playing `url`, passing `options` through unmodified
    fn play(&mut self, url: &str, options: &[String]);

    /// Stop playback
    fn stop(&mut self);

    /// Whether audio is currently flowing
    fn is_playing(&self) -> bool;

    /// Current coarse state
    fn poll_state(&mut self) -> PlayerState;

    /// Current artist and title
    fn poll_metadata(&mut self) -> TrackMetadata;

    /// Output volume (0-100), or -1 when the engine cannot tell
    fn volume(&self) -> i32;

    fn set_volume(&mut self, volume: i32);

    fn is_muted(&self) -> bool;

    fn set_muted(&mut self, muted: bool);
}
