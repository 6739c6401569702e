//! Track change detection
//!
//! Keeps the last-seen track key and the bookkeeping for the fallback
//! provider (unknown-artist streak, fetch spacing, cached result).

use crate::config::timing::{FALLBACK_MIN_INTERVAL, FALLBACK_UNKNOWN_POLLS};
use crate::engine::TrackMetadata;
use std::fmt;
use tokio::time::Instant;

/// Artist/title pair compared by value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackKey {
    pub artist: String,
    pub title: String,
}

impl From<&TrackMetadata> for TrackKey {
    fn from(meta: &TrackMetadata) -> Self {
        Self {
            artist: meta.artist.clone(),
            title: meta.title.clone(),
        }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} — {}", self.artist, self.title)
    }
}

/// A detected change of track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackChange {
    pub previous: Option<TrackKey>,
    pub current: TrackKey,
}

/// Metadata after fallback substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackStep {
    pub metadata: TrackMetadata,
    /// The caller should query the provider now
    pub fetch: bool,
}

#[derive(Debug, Default)]
pub struct TrackTracker {
    last_key: Option<TrackKey>,
    unknown_polls: u32,
    last_fallback_fetch: Option<Instant>,
    fetch_in_flight: bool,
    fallback: Option<TrackMetadata>,
}

impl TrackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_key(&self) -> Option<&TrackKey> {
        self.last_key.as_ref()
    }

    /// Set the last-seen key without emitting a change
    pub fn seed(&mut self, key: TrackKey) {
        self.last_key = Some(key);
    }

    /// Record a polled track
    ///
    /// A change is reported only when the key differs and the title is
    /// not the empty-metadata placeholder.
    pub fn observe(&mut self, meta: &TrackMetadata) -> Option<TrackChange> {
        if meta.is_empty() {
            return None;
        }
        let key = TrackKey::from(meta);
        if self.last_key.as_ref() == Some(&key) {
            return None;
        }

        let previous = self.last_key.replace(key.clone());
        Some(TrackChange {
            previous,
            current: key,
        })
    }

    /// Substitute fallback metadata and decide whether to fetch
    ///
    /// `has_provider` is false for channels without a fallback provider.
    pub fn apply_fallback(
        &mut self,
        meta: TrackMetadata,
        has_provider: bool,
        now: Instant,
    ) -> FallbackStep {
        if !has_provider || !meta.has_unknown_artist() {
            self.unknown_polls = 0;
            self.fallback = None;
            return FallbackStep {
                metadata: meta,
                fetch: false,
            };
        }

        self.unknown_polls = self.unknown_polls.saturating_add(1);

        let spaced = self
            .last_fallback_fetch
            .map_or(true, |last| now.saturating_duration_since(last) >= FALLBACK_MIN_INTERVAL);
        let fetch =
            self.unknown_polls >= FALLBACK_UNKNOWN_POLLS && spaced && !self.fetch_in_flight;
        if fetch {
            self.last_fallback_fetch = Some(now);
            self.fetch_in_flight = true;
        }

        FallbackStep {
            metadata: self.fallback.clone().unwrap_or(meta),
            fetch,
        }
    }

    /// Store a provider result
    ///
    /// An absent, unknown or empty result drops the previous substitute.
    pub fn fallback_arrived(&mut self, result: Option<TrackMetadata>) {
        self.fetch_in_flight = false;
        self.fallback = result.filter(|m| !m.has_unknown_artist() && !m.is_empty());
        match &self.fallback {
            Some(meta) => tracing::debug!("Fallback metadata: {} — {}", meta.artist, meta.title),
            None => tracing::debug!("Fallback provider had nothing usable"),
        }
    }

    /// Forget everything, e.g. on channel change
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
