//! Playback supervisor
//!
//! Owns on-air intent and the engine handle. Reconciles the polled player
//! state against intent, debounces stream loss and reconnects on a fixed
//! backoff ladder.

use crate::config::network::TARGET_VOLUME;
use crate::config::timing::{LOST_DEBOUNCE, RECONNECT_BACKOFF_SECS};
use crate::config::{network::USER_AGENT, url_matches_any};
use crate::engine::{MediaOptions, PlayerState, StreamEngine, TrackMetadata};
use crate::utils::timer::earliest;
use crate::utils::SingleShot;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Playback status as shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Connecting,
    Opening,
    Buffering,
    Playing,
    StreamLost,
    NoUrl,
}

impl PlaybackStatus {
    /// Statuses that should be displayed as errors
    pub fn is_error(&self) -> bool {
        matches!(self, PlaybackStatus::StreamLost | PlaybackStatus::NoUrl)
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PlaybackStatus::Idle => "Idle",
            PlaybackStatus::Connecting => "Connecting...",
            PlaybackStatus::Opening => "Opening...",
            PlaybackStatus::Buffering => "Buffering...",
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::StreamLost => "STREAM LOST",
            PlaybackStatus::NoUrl => "No URL",
        };
        f.write_str(text)
    }
}

/// Reconnect delay for the given retry count
pub fn backoff_delay(retry_count: u32) -> Duration {
    let last = RECONNECT_BACKOFF_SECS.len() - 1;
    let index = (retry_count as usize).min(last);
    Duration::from_secs(RECONNECT_BACKOFF_SECS[index])
}

pub struct PlaybackSupervisor {
    engine: Box<dyn StreamEngine>,
    on_air: bool,
    url: Option<String>,
    retry_count: u32,
    reconnect: SingleShot,
    lost_debounce: SingleShot,
    cache_ms: u64,
    user_agent_markers: Vec<String>,
    last_state: PlayerState,
}

impl PlaybackSupervisor {
    pub fn new(engine: Box<dyn StreamEngine>, cache_ms: u64, user_agent_markers: Vec<String>) -> Self {
        Self {
            engine,
            on_air: false,
            url: None,
            retry_count: 0,
            reconnect: SingleShot::new(),
            lost_debounce: SingleShot::new(),
            cache_ms,
            user_agent_markers,
            last_state: PlayerState::NothingSpecial,
        }
    }

    pub fn on_air(&self) -> bool {
        self.on_air
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_active()
    }

    /// Select the stream to play on the next (re)connect
    pub fn set_url(&mut self, url: Option<String>) {
        self.url = url.filter(|u| !u.trim().is_empty());
    }

    /// Engine options for a URL
    pub fn media_options(&self, url: &str) -> MediaOptions {
        let mut options = MediaOptions::new();
        if url_matches_any(url, &self.user_agent_markers) {
            options = options.user_agent(USER_AGENT);
        }
        options.caching(self.cache_ms)
    }

    /// Go on air and start playing the current URL
    pub fn go_on_air(&mut self) -> PlaybackStatus {
        self.on_air = true;
        self.retry_count = 0;
        self.reconnect.cancel();
        self.lost_debounce.cancel();
        self.start_playback()
    }

    /// Go off air, stopping the engine and cancelling timers
    ///
    /// An active recording must be stopped by the caller first.
    pub fn go_off_air(&mut self) -> PlaybackStatus {
        self.on_air = false;
        self.reconnect.cancel();
        self.lost_debounce.cancel();
        self.engine.stop();
        PlaybackStatus::Idle
    }

    /// Switch streams; replays immediately when on air
    pub fn change_channel(&mut self, url: Option<String>) -> Option<PlaybackStatus> {
        self.set_url(url);
        if !self.on_air {
            return None;
        }
        self.retry_count = 0;
        self.reconnect.cancel();
        self.lost_debounce.cancel();
        Some(self.start_playback())
    }

    fn start_playback(&mut self) -> PlaybackStatus {
        let Some(url) = self.url.clone() else {
            tracing::warn!("No URL for current channel");
            self.on_air = false;
            return PlaybackStatus::NoUrl;
        };

        let options = self.media_options(&url);
        tracing::info!("Playing {} (attempt {})", url, self.retry_count + 1);
        self.engine.play(&url, options.as_slice());
        PlaybackStatus::Connecting
    }

    /// Poll the engine's coarse state, logging transitions
    pub fn poll_state(&mut self) -> PlayerState {
        let state = self.engine.poll_state();
        if state != self.last_state {
            tracing::debug!("Player state {} -> {}", self.last_state, state);
            self.last_state = state;
        }
        state
    }

    pub fn poll_metadata(&mut self) -> TrackMetadata {
        self.engine.poll_metadata()
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    /// Reconcile one polled state against intent
    ///
    /// Returns the status to show, or `None` to keep the current one.
    pub fn reconcile(&mut self, state: PlayerState, now: Instant) -> Option<PlaybackStatus> {
        if !self.on_air {
            if state.is_active() {
                tracing::debug!("Off air but engine is {}, stopping", state);
                self.engine.stop();
            }
            self.lost_debounce.cancel();
            return Some(PlaybackStatus::Idle);
        }

        match state {
            PlayerState::Playing => {
                self.retry_count = 0;
                self.lost_debounce.cancel();
                self.reconnect.cancel();
                self.enforce_audio();
                Some(PlaybackStatus::Playing)
            }
            PlayerState::Opening => {
                self.lost_debounce.cancel();
                Some(PlaybackStatus::Opening)
            }
            PlayerState::Buffering => {
                self.lost_debounce.cancel();
                Some(PlaybackStatus::Buffering)
            }
            PlayerState::Paused => {
                self.lost_debounce.cancel();
                Some(PlaybackStatus::Playing)
            }
            _ => {
                if self.reconnect.is_active() {
                    Some(PlaybackStatus::StreamLost)
                } else if !self.lost_debounce.is_active() {
                    self.lost_debounce.start(now, LOST_DEBOUNCE);
                    Some(PlaybackStatus::Connecting)
                } else {
                    None
                }
            }
        }
    }

    fn enforce_audio(&mut self) {
        if self.engine.is_muted() {
            self.engine.set_muted(false);
        }
        let volume = self.engine.volume();
        if volume != TARGET_VOLUME && volume != -1 {
            self.engine.set_volume(TARGET_VOLUME);
        }
    }

    /// Fire the debounce and reconnect timers if due
    pub fn fire_due_timers(&mut self, now: Instant) -> Option<PlaybackStatus> {
        let mut status = None;

        if self.lost_debounce.fire(now) {
            status = self.confirm_lost(now);
        }

        if self.reconnect.fire(now) && self.on_air {
            tracing::info!("Reconnect attempt {}", self.retry_count);
            status = Some(self.start_playback());
        }

        status
    }

    fn confirm_lost(&mut self, now: Instant) -> Option<PlaybackStatus> {
        if !self.on_air {
            return None;
        }
        let state = self.poll_state();
        if !state.is_lost() {
            return None;
        }

        tracing::warn!("Stream loss confirmed (state={})", state);
        if !self.reconnect.is_active() {
            let delay = backoff_delay(self.retry_count);
            tracing::info!("Reconnect in {}s", delay.as_secs());
            self.reconnect.start(now, delay);
            self.retry_count = self.retry_count.saturating_add(1);
        }
        Some(PlaybackStatus::StreamLost)
    }

    /// Earliest armed timer
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([self.lost_debounce.deadline(), self.reconnect.deadline()])
    }

    /// Stop the engine for good
    pub fn shutdown(&mut self) {
        self.on_air = false;
        self.reconnect.cancel();
        self.lost_debounce.cancel();
        self.engine.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;

    fn supervisor(engine: &FakeEngine) -> PlaybackSupervisor {
        let markers = vec!["sharp-stream.com".to_string()];
        let mut supervisor = PlaybackSupervisor::new(Box::new(engine.clone()), 1500, markers);
        supervisor.set_url(Some("http://example.org/live".to_string()));
        supervisor
    }

    /// Drive one tick: poll, reconcile, then fire due timers
    fn tick(supervisor: &mut PlaybackSupervisor, now: Instant) -> Option<PlaybackStatus> {
        let state = supervisor.poll_state();
        let status = supervisor.reconcile(state, now);
        supervisor.fire_due_timers(now).or(status)
    }

    #[test]
    fn test_backoff_ladder() {
        let expected = [1, 2, 5, 10, 10, 10, 10];
        for (n, secs) in expected.iter().enumerate() {
            assert_eq!(backoff_delay(n as u32), Duration::from_secs(*secs));
        }
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_go_on_air_plays_with_options() {
        let engine = FakeEngine::new();
        let mut sup = supervisor(&engine);

        assert_eq!(sup.go_on_air(), PlaybackStatus::Connecting);
        let plays = engine.plays();
        assert_eq!(plays.len(), 1);
        assert_eq!(plays[0].0, "http://example.org/live");
        assert!(plays[0].1.contains(&":network-caching=1500".to_string()));
        assert!(plays[0].1.contains(&":live-caching=1500".to_string()));
        assert!(!plays[0].1.iter().any(|o| o.starts_with(":http-user-agent")));
    }

    #[test]
    fn test_marker_url_gets_user_agent() {
        let engine = FakeEngine::new();
        let mut sup = supervisor(&engine);
        sup.set_url(Some("http://edge.sharp-stream.com/x.aac".to_string()));
        sup.go_on_air();
        assert_eq!(
            engine.plays()[0].1[0],
            format!(":http-user-agent={}", USER_AGENT)
        );
    }

    #[test]
    fn test_no_url_fails_to_status() {
        let engine = FakeEngine::new();
        let mut sup = supervisor(&engine);
        sup.set_url(None);
        assert_eq!(sup.go_on_air(), PlaybackStatus::NoUrl);
        assert!(!sup.on_air());
        assert_eq!(engine.play_count(), 0);
    }

    #[test]
    fn test_stopped_past_debounce_schedules_reconnect_at_one_second() {
        let engine = FakeEngine::new();
        let mut sup = supervisor(&engine);
        let t0 = Instant::now();
        sup.go_on_air();
        engine.set_state(PlayerState::Stopped);

        assert_eq!(tick(&mut sup, t0), Some(PlaybackStatus::Connecting));
        assert_eq!(tick(&mut sup, t0 + Duration::from_millis(500)), None);
        assert_eq!(tick(&mut sup, t0 + Duration::from_millis(1000)), None);
        assert!(!sup.reconnect_pending());

        let t_lost = t0 + Duration::from_millis(1200);
        assert_eq!(tick(&mut sup, t_lost), Some(PlaybackStatus::StreamLost));
        assert!(sup.reconnect_pending());
        assert_eq!(sup.next_deadline(), Some(t_lost + Duration::from_secs(1)));
        assert_eq!(sup.retry_count(), 1);

        // Reconnect fires and replays
        let t_retry = t_lost + Duration::from_secs(1);
        assert_eq!(tick(&mut sup, t_retry), Some(PlaybackStatus::Connecting));
        assert_eq!(engine.play_count(), 2);
    }

    #[test]
    fn test_successive_losses_follow_ladder() {
        let engine = FakeEngine::new();
        let mut sup = supervisor(&engine);
        let mut now = Instant::now();
        sup.go_on_air();

        let mut delays = Vec::new();
        for _ in 0..5 {
            engine.set_state(PlayerState::Error);
            tick(&mut sup, now);
            now += LOST_DEBOUNCE;
            tick(&mut sup, now);
            let deadline = sup.next_deadline().unwrap();
            delays.push((deadline - now).as_secs());
            now = deadline;
            tick(&mut sup, now);
        }
        assert_eq!(delays, vec![1, 2, 5, 10, 10]);
    }

    #[test]
    fn test_playing_resets_retry_and_enforces_audio() {
        let engine = FakeEngine::new();
        let mut sup = supervisor(&engine);
        let now = Instant::now();
        sup.go_on_air();
        engine.set_state(PlayerState::Ended);
        tick(&mut sup, now);
        tick(&mut sup, now + LOST_DEBOUNCE);
        assert_eq!(sup.retry_count(), 1);

        engine.set_audio(20, true);
        engine.set_state(PlayerState::Playing);
        assert_eq!(tick(&mut sup, now + LOST_DEBOUNCE), Some(PlaybackStatus::Playing));
        assert_eq!(sup.retry_count(), 0);
        assert!(!sup.reconnect_pending());
        assert_eq!(engine.audio(), (80, false));
    }

    #[test]
    fn test_unknown_volume_is_left_alone() {
        let engine = FakeEngine::new();
        let mut sup = supervisor(&engine);
        sup.go_on_air();
        engine.set_audio(-1, false);
        engine.set_state(PlayerState::Playing);
        tick(&mut sup, Instant::now());
        assert_eq!(engine.audio(), (-1, false));
    }

    #[test]
    fn test_connecting_states_clear_debounce() {
        let engine = FakeEngine::new();
        let mut sup = supervisor(&engine);
        let now = Instant::now();
        sup.go_on_air();

        engine.set_state(PlayerState::NothingSpecial);
        tick(&mut sup, now);
        assert!(sup.next_deadline().is_some());

        engine.set_state(PlayerState::Buffering);
        assert_eq!(tick(&mut sup, now), Some(PlaybackStatus::Buffering));
        assert!(sup.next_deadline().is_none());

        engine.set_state(PlayerState::Paused);
        assert_eq!(tick(&mut sup, now), Some(PlaybackStatus::Playing));
    }

    #[test]
    fn test_no_reconnect_fires_off_air() {
        let engine = FakeEngine::new();
        let mut sup = supervisor(&engine);
        let now = Instant::now();
        sup.go_on_air();
        engine.set_state(PlayerState::Stopped);
        tick(&mut sup, now);
        tick(&mut sup, now + LOST_DEBOUNCE);
        assert!(sup.reconnect_pending());

        assert_eq!(sup.go_off_air(), PlaybackStatus::Idle);
        assert!(!sup.reconnect_pending());
        tick(&mut sup, now + Duration::from_secs(60));
        assert_eq!(engine.play_count(), 1);
    }

    #[test]
    fn test_off_air_stops_active_engine() {
        let engine = FakeEngine::new();
        let mut sup = supervisor(&engine);
        engine.set_state(PlayerState::Playing);
        assert_eq!(tick(&mut sup, Instant::now()), Some(PlaybackStatus::Idle));
        assert_eq!(engine.stop_count(), 1);

        // Already stopped engines are left alone
        tick(&mut sup, Instant::now());
        assert_eq!(engine.stop_count(), 1);
    }

    #[test]
    fn test_channel_change_replays_new_url() {
        let engine = FakeEngine::new();
        let mut sup = supervisor(&engine);
        let now = Instant::now();
        sup.go_on_air();
        engine.set_state(PlayerState::Stopped);
        tick(&mut sup, now);
        tick(&mut sup, now + LOST_DEBOUNCE);

        let status = sup.change_channel(Some("http://example.org/other".to_string()));
        assert_eq!(status, Some(PlaybackStatus::Connecting));
        assert_eq!(sup.retry_count(), 0);
        assert!(!sup.reconnect_pending());
        assert_eq!(engine.plays().last().unwrap().0, "http://example.org/other");
    }

    #[test]
    fn test_channel_change_off_air_only_selects() {
        let engine = FakeEngine::new();
        let mut sup = supervisor(&engine);
        assert_eq!(sup.change_channel(Some("http://b".to_string())), None);
        assert_eq!(sup.url(), Some("http://b"));
        assert_eq!(engine.play_count(), 0);
    }
}
