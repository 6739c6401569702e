//! Fallback metadata provider contract
//!
//! Some channels carry no usable in-stream tags. For those, a provider
//! named in the channel entry can look the current track up elsewhere.

use crate::engine::TrackMetadata;
use async_trait::async_trait;

/// A source of now-playing data outside the stream
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Whether this provider handles the channel's `meta_provider` id
    fn supports(&self, provider_id: &str) -> bool;

    /// Fetch the current track for a channel
    ///
    /// `Ok(None)` means the provider had nothing to offer.
    async fn fetch(&self, provider_id: &str, meta_url: &str) -> anyhow::Result<Option<TrackMetadata>>;
}
