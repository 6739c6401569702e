//! TapeDeck - a personal internet-radio capture station.
//!
//! Live stream playback with automatic reconnect, plus supervised
//! recording of the same stream through an external FFmpeg process, with
//! a per-recording track log. The host shell supplies the stream engine
//! and renders the events published by [`Station`].

pub mod config;
pub mod engine;
pub mod metadata;
pub mod playback;
pub mod recorder;
pub mod station;
pub mod tapelog;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::{Channel, ChannelRegistry, Settings};
pub use engine::{PlayerState, StreamEngine, TrackMetadata};
pub use metadata::MetadataProvider;
pub use recorder::SystemLauncher;
pub use station::{Station, StationCommand, StationEvent, StationHandle};
pub use utils::{AppError, AppResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber
///
/// Honors `RUST_LOG`; safe to call more than once.
pub fn init_tracing() {
    let installed = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tapedeck=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if installed.is_ok() {
        tracing::debug!("Tracing initialized");
    }
}
