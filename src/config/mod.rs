//! Station configuration
//!
//! The settings bag, the channel list and the fixed tuning constants of the
//! supervisors.

pub mod channels;
pub mod settings;

pub use channels::{Channel, ChannelRegistry};
pub use settings::Settings;

/// Control-loop and playback timing
pub mod timing {
    use std::time::Duration;

    /// Interval of the reconciliation tick
    pub const TICK: Duration = Duration::from_millis(500);

    /// How long a lost-looking player state must persist before it counts
    pub const LOST_DEBOUNCE: Duration = Duration::from_millis(1200);

    /// Reconnect delays in seconds, indexed by retry count (saturating)
    pub const RECONNECT_BACKOFF_SECS: [u64; 4] = [1, 2, 5, 10];

    /// Consecutive "Unknown" artist polls before asking the fallback provider
    pub const FALLBACK_UNKNOWN_POLLS: u32 = 3;

    /// Minimum spacing between two fallback provider queries
    pub const FALLBACK_MIN_INTERVAL: Duration = Duration::from_secs(15);

    /// How long an error status stays up before tick statuses replace it
    pub const ERROR_STATUS_HOLD: Duration = Duration::from_secs(3);
}

/// Recording supervision
pub mod recording {
    use std::time::Duration;

    /// Spacing between two health-check steps
    pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_millis(1500);

    /// Number of health-check steps before a recording is trusted
    pub const HEALTH_CHECK_STEPS: u8 = 4;

    /// Lines of transcoder stderr kept for diagnostics
    pub const STDERR_RING_CAPACITY: usize = 50;

    /// Lines of stderr returned with a status check
    pub const STDERR_TAIL_LINES: usize = 5;

    /// Wait after the quit request, and again after terminate
    pub const STOP_GRACE: Duration = Duration::from_secs(2);

    /// Wait for the process to be reaped after a forced kill
    pub const KILL_REAP: Duration = Duration::from_secs(1);

    /// Audio bitrate used when re-encoding
    pub const REENCODE_BITRATE: &str = "192k";
}

/// Network identity and audio defaults
pub mod network {
    /// Browser-like User-Agent for CDNs that drop requests without one
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; TapeDeck)";

    /// Volume the player is held at while playing
    pub const TARGET_VOLUME: i32 = 80;

    /// Provider URL markers with known quirks
    pub const DEFAULT_PROVIDER_MARKERS: [&str; 3] = ["sharp-stream.com", "instreamtest", "aacp"];
}

/// Match a URL against a marker table (case-insensitive substring)
pub fn url_matches_any(url: &str, markers: &[String]) -> bool {
    let url = url.to_lowercase();
    markers
        .iter()
        .any(|marker| !marker.is_empty() && url.contains(&marker.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_matches_any() {
        let markers = vec!["sharp-stream.com".to_string(), "AACP".to_string()];
        assert!(url_matches_any("https://Radio.Sharp-Stream.com/x.mp3", &markers));
        assert!(url_matches_any("https://example.org/live.aacp", &markers));
        assert!(!url_matches_any("https://example.org/live.mp3", &markers));
    }

    #[test]
    fn test_empty_marker_never_matches() {
        let markers = vec![String::new()];
        assert!(!url_matches_any("https://example.org/live.mp3", &markers));
    }
}
