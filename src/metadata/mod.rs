//! Track metadata tracking and the fallback provider contract

pub mod provider;
pub mod track;

pub use provider::MetadataProvider;
pub use track::{FallbackStep, TrackChange, TrackKey, TrackTracker};
