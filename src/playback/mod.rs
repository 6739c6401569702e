//! Live stream playback with reconnect

pub mod supervisor;

pub use supervisor::{backoff_delay, PlaybackStatus, PlaybackSupervisor};
