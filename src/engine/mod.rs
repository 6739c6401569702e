//! Streaming media engine boundary
//!
//! State and metadata types read from the engine, and the trait the
//! engine adapter implements.

pub mod traits;
pub mod types;

pub use traits::StreamEngine;
pub use types::{MediaOptions, PlayerState, TrackMetadata, EMPTY_TITLE, UNKNOWN_ARTIST};
