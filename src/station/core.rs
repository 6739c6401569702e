//! Station control loop
//!
//! `Station` is the single owned application session. Its loop reconciles
//! user intent against the two supervisors on a fixed tick, runs the
//! health-check ladder and the playback timers, polls metadata on its own
//! interval and applies user commands. Nothing else mutates the
//! supervisors, so no callback ever runs re-entrantly.

use super::commands::{StationCommand, StationHandle};
use super::events::{StationEvent, StatusLine};
use super::status::StatusBoard;
use crate::config::timing::TICK;
use crate::config::{Channel, ChannelRegistry, Settings};
use crate::engine::{StreamEngine, TrackMetadata};
use crate::metadata::{MetadataProvider, TrackKey, TrackTracker};
use crate::playback::{PlaybackStatus, PlaybackSupervisor};
use crate::recorder::{
    FailureAction, HealthCheckLadder, LadderVerdict, RecorderState, RecordingIntent,
    RecordingRequest, RecordingSupervisor, TranscoderLauncher, TranscoderLocator,
};
use crate::tapelog::{EventKind, TapeLogger};
use crate::utils::timer::earliest;
use crate::utils::{
    file_timestamp_now, format_elapsed, hms_now, safe_filename, unique_base_name, RecorderError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

const EVENT_CAPACITY: usize = 100;
const COMMAND_CAPACITY: usize = 32;
const IDLE_REC_TIMER: &str = "00:00:00";

/// Result of a fallback provider query, tagged with its channel
type FallbackResult = (String, Option<TrackMetadata>);

/// A user-requested recording or the re-encode retry of a failed one
enum Attempt {
    Fresh,
    Retry { url: String, low_latency: bool },
}

pub struct Station {
    settings: Settings,
    channels: ChannelRegistry,
    current_channel: Option<String>,

    playback: PlaybackSupervisor,
    recorder: RecordingSupervisor,
    ladder: HealthCheckLadder,
    /// Record indicator as shown to the user
    intent: RecordingIntent,
    /// Transcoder found at startup
    recorder_available: bool,

    tape: Option<TapeLogger>,
    tracker: TrackTracker,
    current_track: TrackMetadata,

    provider: Option<Arc<dyn MetadataProvider>>,
    fallback_tx: mpsc::UnboundedSender<FallbackResult>,
    fallback_rx: mpsc::UnboundedReceiver<FallbackResult>,

    status: StatusBoard,
    shown_on_air: Option<bool>,
    shown_rec_timer: Option<String>,

    events: broadcast::Sender<StationEvent>,
    commands: mpsc::Receiver<StationCommand>,
}

impl Station {
    /// Build a station and the handle used to drive it
    pub fn new(
        settings: Settings,
        channels: ChannelRegistry,
        engine: Box<dyn StreamEngine>,
        launcher: Arc<dyn TranscoderLauncher>,
        provider: Option<Arc<dyn MetadataProvider>>,
    ) -> (Self, StationHandle) {
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (fallback_tx, fallback_rx) = mpsc::unbounded_channel();

        let playback = PlaybackSupervisor::new(
            engine,
            settings.network_cache_ms,
            settings.user_agent_markers.clone(),
        );
        let locator = TranscoderLocator::new(settings.ffmpeg_path.clone(), settings.app_root.clone());
        let recorder =
            RecordingSupervisor::new(locator, launcher, settings.force_reencode_markers.clone());

        let handle = StationHandle::new(command_tx, events.clone());
        let station = Self {
            settings,
            channels,
            current_channel: None,
            playback,
            recorder,
            ladder: HealthCheckLadder::default(),
            intent: RecordingIntent::Off,
            recorder_available: false,
            tape: None,
            tracker: TrackTracker::new(),
            current_track: TrackMetadata::unknown(),
            provider,
            fallback_tx,
            fallback_rx,
            status: StatusBoard::default(),
            shown_on_air: None,
            shown_rec_timer: None,
            events,
            commands,
        };
        (station, handle)
    }

    /// Run until shutdown is requested or every handle is dropped
    pub async fn run(mut self) {
        self.start_up(Instant::now());

        let mut tick = interval(TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut metadata = interval(self.settings.metadata_poll_interval());
        metadata.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(StationCommand::Shutdown) | None => {
                        self.shut_down().await;
                        break;
                    }
                    Some(command) => self.handle_command(command, Instant::now()).await,
                },
                _ = tick.tick() => self.on_tick(Instant::now()).await,
                _ = metadata.tick() => self.on_metadata_poll(Instant::now()),
                _ = sleep_until_deadline(deadline) => self.on_timers(Instant::now()).await,
                Some((channel, result)) = self.fallback_rx.recv() => {
                    self.on_fallback_result(channel, result);
                }
            }
        }

        tracing::info!("Station stopped");
    }

    // =========================================================================
    // Startup and shutdown
    // =========================================================================

    pub(crate) fn start_up(&mut self, now: Instant) {
        tracing::info!("Starting TapeDeck v{}", env!("CARGO_PKG_VERSION"));

        match self.recorder.probe() {
            Ok(path) => {
                tracing::info!("FFmpeg available at {:?}", path);
                self.recorder_available = true;
            }
            Err(e) => {
                tracing::warn!("Recording disabled: {}", e);
                self.recorder_available = false;
                self.post("FFmpeg missing: REC disabled", true, now);
            }
        }

        let initial = self
            .settings
            .default_channel
            .as_deref()
            .and_then(|name| self.channels.get(name))
            .or_else(|| self.channels.first())
            .cloned();
        if let Some(channel) = initial {
            self.select_channel(&channel);
        }

        self.publish_on_air();
        self.publish(StationEvent::Recording(self.intent));
        self.publish_rec_timer(IDLE_REC_TIMER.to_string());
    }

    /// Stop any recording before the engine, then release both
    pub(crate) async fn shut_down(&mut self) {
        tracing::info!("Shutting down station");
        if self.recorder.is_active() {
            self.stop_recording_by_user(Instant::now()).await;
        }
        self.ladder.cancel();
        self.playback.shutdown();
        self.publish_on_air();
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub(crate) async fn handle_command(&mut self, command: StationCommand, now: Instant) {
        tracing::debug!("Command: {:?}", command);
        match command {
            StationCommand::SetOnAir(true) => {
                let status = self.playback.go_on_air();
                self.post_playback(status, now);
                self.publish_on_air();
            }
            StationCommand::SetOnAir(false) => {
                if self.recorder.is_active() {
                    self.stop_recording_by_user(now).await;
                }
                let status = self.playback.go_off_air();
                self.post_playback(status, now);
                self.publish_on_air();
            }
            StationCommand::SetRecording(wanted) => self.set_recording(wanted, now).await,
            StationCommand::SetChannel(name) => self.set_channel(&name, now),
            StationCommand::LastLogLine(reply) => {
                let line = self
                    .tape
                    .as_ref()
                    .and_then(|tape| tape.last_line())
                    .map(str::to_string);
                if line.is_some() {
                    self.post("Copied last log line", false, now);
                }
                // The requester may have given up
                let _ = reply.send(line);
            }
            StationCommand::Shutdown => self.shut_down().await,
        }
    }

    async fn set_recording(&mut self, wanted: bool, now: Instant) {
        if wanted == self.recorder.is_active() {
            if !wanted {
                self.set_intent(RecordingIntent::Off);
            }
            // Already there; re-sync the indicator
            self.publish(StationEvent::Recording(self.intent));
            return;
        }

        if !wanted {
            self.stop_recording_by_user(now).await;
            return;
        }

        if !self.recorder_available {
            let missing = RecorderError::NotFound(self.settings.ffmpeg_path.clone());
            self.refuse_recording(missing.status_text(), now);
            return;
        }
        if !self.playback.on_air() || !self.playback.is_playing() {
            self.refuse_recording("Must be ON AIR to record", now);
            return;
        }

        self.recorder.clear_error();
        self.start_attempt(Attempt::Fresh, now);
    }

    fn refuse_recording(&mut self, reason: &str, now: Instant) {
        self.post(reason, true, now);
        self.set_intent(RecordingIntent::Off);
        // Force the indicator back even if the intent was already Off
        self.publish(StationEvent::Recording(self.intent));
    }

    fn set_channel(&mut self, name: &str, now: Instant) {
        if self.recorder.is_active() {
            self.post("Stop REC before switching channel", true, now);
            return;
        }
        let Some(channel) = self.channels.get(name).cloned() else {
            tracing::warn!("Unknown channel '{}'", name);
            self.post(format!("Unknown channel: {}", name), true, now);
            return;
        };

        if let Some(status) = self.select_channel(&channel) {
            self.post_playback(status, now);
        }
    }

    fn select_channel(&mut self, channel: &Channel) -> Option<PlaybackStatus> {
        tracing::info!("Channel: {}", channel.name);
        self.current_channel = Some(channel.name.clone());
        self.tracker.reset();
        self.publish(StationEvent::Channel(channel.name.clone()));
        self.playback
            .change_channel(channel.stream_url().map(str::to_string))
    }

    // =========================================================================
    // Recording lifecycle
    // =========================================================================

    fn start_attempt(&mut self, attempt: Attempt, now: Instant) {
        let request = match self.recording_request(&attempt) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("Cannot prepare recording: {}", e);
                self.fail_terminally(e.status_text(), now);
                return;
            }
        };

        let started = match attempt {
            Attempt::Fresh => self.recorder.start(request),
            Attempt::Retry { .. } => self.recorder.retry(request),
        };

        match started {
            Ok(()) => {
                self.set_intent(RecordingIntent::Requested);
                self.post("REC Starting...", false, now);
                self.ladder.arm(now);
            }
            Err(e) => {
                tracing::error!("Recording start failed: {}", e);
                self.fail_terminally(e.status_text(), now);
            }
        }
    }

    fn recording_request(&self, attempt: &Attempt) -> Result<RecordingRequest, RecorderError> {
        let (url, prefer_copy, low_latency) = match attempt {
            Attempt::Fresh => {
                let url = self
                    .playback
                    .url()
                    .ok_or_else(|| RecorderError::Io(std::io::Error::other("channel has no URL")))?;
                (
                    url.to_string(),
                    self.settings.prefer_stream_copy,
                    self.settings.low_latency_mode,
                )
            }
            // Same source and latency as the failed session
            Attempt::Retry { url, low_latency } => (url.clone(), false, *low_latency),
        };

        let dir = self.settings.resolved_output_dir();
        std::fs::create_dir_all(&dir)?;

        let ext = self.settings.container_ext();
        let channel = self.current_channel.as_deref().unwrap_or("Unknown");
        let template = format!("TapeDeck_{}_{}", safe_filename(channel), file_timestamp_now());
        let base = unique_base_name(&dir, &template, ext);

        Ok(RecordingRequest {
            url,
            output_path: dir.join(format!("{}.{}", base, ext)),
            log_path: dir.join(format!("{}_rec.txt", base)),
            prefer_stream_copy: prefer_copy,
            low_latency,
        })
    }

    /// Health checks passed: open the tape log and trust the recording
    fn activate_recording(&mut self, now: Instant) {
        if !self.recorder.finalize(now) {
            return;
        }
        let Some(log_path) = self.recorder.session().map(|s| s.log_path.clone()) else {
            return;
        };

        let events = self.events.clone();
        let mut tape = TapeLogger::new(
            log_path,
            Some(Box::new(move |line: &str| {
                let _ = events.send(StationEvent::RecLog(line.to_string()));
            })),
        );
        let key = TrackKey::from(&self.current_track);
        tape.log_event(EventKind::Start, &key.to_string(), Some(Duration::ZERO), None);
        self.tracker.seed(key);
        self.tape = Some(tape);

        self.set_intent(RecordingIntent::Confirmed);
        self.post("Recording", false, now);
    }

    /// Route a failed attempt through the one-shot re-encode fallback
    async fn fail_recording(&mut self, now: Instant) {
        self.ladder.cancel();
        match self.recorder.handle_failure().await {
            FailureAction::RetryWithReencode { url, low_latency } => {
                self.post("REC retry: re-encode", false, now);
                self.start_attempt(Attempt::Retry { url, low_latency }, now);
            }
            FailureAction::Terminal => self.fail_terminally("FFMPEG ERROR", now),
        }
    }

    fn fail_terminally(&mut self, status: &str, now: Instant) {
        self.ladder.cancel();
        self.set_intent(RecordingIntent::Failed);
        self.post(status, true, now);
    }

    async fn stop_recording_by_user(&mut self, now: Instant) {
        self.ladder.cancel();

        // A session still in its health checks has no tape log yet
        if self.recorder.state() == RecorderState::Recording {
            let elapsed = self.recorder.elapsed();
            let key = TrackKey::from(&self.current_track).to_string();
            if let Some(tape) = self.tape.as_mut() {
                tape.log_event(EventKind::End, &key, Some(elapsed), Some("stopped by user"));
            }
        }

        let outcome = self.recorder.stop().await;
        self.set_intent(RecordingIntent::Off);
        self.publish_rec_timer(IDLE_REC_TIMER.to_string());

        if outcome.is_clean() {
            let text = if self.playback.is_playing() { "Playing" } else { "Idle" };
            self.post(text, false, now);
        } else {
            self.post("FFMPEG ERROR: stop failed", true, now);
        }
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// One reconciliation pass: crash check, indicator sync, playback
    pub(crate) async fn on_tick(&mut self, now: Instant) {
        if self.recorder.state() == RecorderState::Recording {
            match self.recorder.check_status() {
                Some(health) if !health.alive => {
                    tracing::error!(
                        session = ?self.recorder.session().map(|s| s.id),
                        "Transcoder crashed: {}",
                        health.stderr_tail.join(" | ")
                    );
                    let elapsed = self.recorder.elapsed();
                    if let Some(tape) = self.tape.as_mut() {
                        let info = format!(
                            "{} (FFmpeg exited: {})",
                            TrackKey::from(&self.current_track),
                            crash_tail(&health.stderr_tail)
                        );
                        tape.log_event(EventKind::Crash, &info, Some(elapsed), None);
                    }
                    self.fail_recording(now).await;
                }
                _ => self.publish_rec_timer(format_elapsed(self.recorder.elapsed())),
            }
        } else {
            self.publish_rec_timer(IDLE_REC_TIMER.to_string());
        }

        self.sync_record_indicator();

        let state = self.playback.poll_state();
        if let Some(status) = self.playback.reconcile(state, now) {
            let text = match (status, self.recorder.state()) {
                (PlaybackStatus::Playing, RecorderState::Recording) => "Recording".to_string(),
                (PlaybackStatus::Playing, RecorderState::Starting) => "REC Starting...".to_string(),
                (status, _) => status.to_string(),
            };
            if let Some(line) = self
                .status
                .post_routine(StatusLine::new(text, status.is_error()), now)
            {
                self.publish(StationEvent::Status(line));
            }
        }
        self.publish_on_air();
    }

    /// Correct the record indicator, tolerating transient recorder states
    fn sync_record_indicator(&mut self) {
        let state = self.recorder.state();
        if state.is_transient() {
            return;
        }
        let truth = state == RecorderState::Recording;
        if self.intent.shows_recording() != truth {
            let corrected = if truth {
                RecordingIntent::Confirmed
            } else {
                RecordingIntent::Off
            };
            tracing::debug!(
                "Syncing record indicator to {:?} (recorder {})",
                corrected,
                state
            );
            self.set_intent(corrected);
        }
    }

    // =========================================================================
    // Timers
    // =========================================================================

    fn next_deadline(&self) -> Option<Instant> {
        earliest([self.playback.next_deadline(), self.ladder.deadline()])
    }

    pub(crate) async fn on_timers(&mut self, now: Instant) {
        if let Some(status) = self.playback.fire_due_timers(now) {
            self.post_playback(status, now);
        }

        if self.ladder.fire(now) {
            self.health_check_step(now).await;
        }
    }

    async fn health_check_step(&mut self, now: Instant) {
        if self.recorder.state() != RecorderState::Starting {
            // Stopped or failed while the step was pending
            self.ladder.cancel();
            return;
        }
        let Some(health) = self.recorder.check_status() else {
            self.ladder.cancel();
            return;
        };

        match self.ladder.evaluate(&health, now) {
            LadderVerdict::Continue => {}
            LadderVerdict::Passed => self.activate_recording(now),
            LadderVerdict::Failed(failure) => {
                tracing::warn!(
                    "Health check {} failed: {}. Tail: {}",
                    self.ladder.step(),
                    failure.describe(),
                    health.stderr_tail.join(" | ")
                );
                self.fail_recording(now).await;
            }
        }
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub(crate) fn on_metadata_poll(&mut self, now: Instant) {
        if !self.playback.is_playing() {
            return;
        }
        let channel = self
            .current_channel
            .as_deref()
            .and_then(|name| self.channels.get(name))
            .cloned();

        let raw = self.playback.poll_metadata();
        let fallback = channel.as_ref().and_then(|c| self.fallback_source(c));
        let step = self.tracker.apply_fallback(raw, fallback.is_some(), now);
        if let (true, Some((provider, provider_id, meta_url)), Some(channel)) =
            (step.fetch, fallback, channel.as_ref())
        {
            self.spawn_fallback_fetch(provider, channel.name.clone(), provider_id, meta_url);
        }

        let meta = step.metadata;
        self.current_track = meta.clone();
        self.publish(StationEvent::NowPlaying(meta.clone()));

        let Some(change) = self.tracker.observe(&meta) else {
            return;
        };

        let channel_name = self.current_channel.clone().unwrap_or_default();
        self.publish(StationEvent::History(format!(
            "[{}] [{}] {}",
            hms_now(),
            channel_name,
            change.current
        )));

        if self.recorder.state() == RecorderState::Recording {
            let elapsed = self.recorder.elapsed();
            if let Some(tape) = self.tape.as_mut() {
                if let Some(previous) = &change.previous {
                    tape.log_event(
                        EventKind::End,
                        &previous.to_string(),
                        Some(elapsed),
                        Some("track changed"),
                    );
                }
                tape.log_event(EventKind::Start, &change.current.to_string(), Some(elapsed), None);
            }
        }
    }

    /// Provider, provider id and URL for a channel with a usable fallback
    fn fallback_source(
        &self,
        channel: &Channel,
    ) -> Option<(Arc<dyn MetadataProvider>, String, String)> {
        let provider = self.provider.as_ref()?;
        let provider_id = channel.meta_provider.as_deref()?;
        let meta_url = channel.meta_url.as_deref()?;
        provider
            .supports(provider_id)
            .then(|| (provider.clone(), provider_id.to_string(), meta_url.to_string()))
    }

    fn spawn_fallback_fetch(
        &self,
        provider: Arc<dyn MetadataProvider>,
        channel: String,
        provider_id: String,
        meta_url: String,
    ) {
        let tx = self.fallback_tx.clone();
        tracing::debug!("Querying fallback provider {} for {}", provider_id, channel);
        tokio::spawn(async move {
            let result = match provider.fetch(&provider_id, &meta_url).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!("Fallback provider {} failed: {:#}", provider_id, e);
                    None
                }
            };
            // The station may have shut down meanwhile
            let _ = tx.send((channel, result));
        });
    }

    pub(crate) fn on_fallback_result(&mut self, channel: String, result: Option<TrackMetadata>) {
        if self.current_channel.as_deref() != Some(channel.as_str()) {
            tracing::debug!("Dropping fallback result for previous channel {}", channel);
            return;
        }
        self.tracker.fallback_arrived(result);
    }

    // =========================================================================
    // Publishing
    // =========================================================================

    fn publish(&self, event: StationEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn post(&mut self, text: impl Into<String>, error: bool, now: Instant) {
        if let Some(line) = self.status.post(StatusLine::new(text, error), now) {
            self.publish(StationEvent::Status(line));
        }
    }

    fn post_playback(&mut self, status: PlaybackStatus, now: Instant) {
        self.post(status.to_string(), status.is_error(), now);
    }

    fn set_intent(&mut self, intent: RecordingIntent) {
        if self.intent != intent {
            self.intent = intent;
            self.publish(StationEvent::Recording(intent));
        }
    }

    fn publish_on_air(&mut self) {
        let on_air = self.playback.on_air();
        if self.shown_on_air != Some(on_air) {
            self.shown_on_air = Some(on_air);
            self.publish(StationEvent::OnAir(on_air));
        }
    }

    fn publish_rec_timer(&mut self, text: String) {
        if self.shown_rec_timer.as_deref() != Some(text.as_str()) {
            self.shown_rec_timer = Some(text.clone());
            self.publish(StationEvent::RecTimer(text));
        }
    }

    /// Record indicator as currently shown
    pub fn intent(&self) -> RecordingIntent {
        self.intent
    }

    pub fn current_channel(&self) -> Option<&str> {
        self.current_channel.as_deref()
    }
}

/// Short stderr excerpt for a CRASH line
fn crash_tail(tail: &[String]) -> String {
    const MAX_CHARS: usize = 100;
    let joined = tail.join(" | ");
    if joined.is_empty() {
        return "no output".to_string();
    }
    joined.chars().take(MAX_CHARS).collect()
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
