//! Recording supervisor
//!
//! Owns the transcoder process and the active session: start, status
//! checks, promotion to recording, the stop ladder and the one-shot
//! re-encode fallback.

use super::ffmpeg::{build_args, effective_stream_copy, TranscodeJob, TranscoderLocator};
use super::health::TranscoderHealth;
use super::process::{spawn_stderr_drain, StderrRing, TranscoderLauncher, TranscoderProcess};
use super::state::{FailureAction, RecorderState, RecordingRequest, RecordingSession, StopOutcome};
use crate::config::recording::{KILL_REAP, STDERR_TAIL_LINES, STOP_GRACE};
use crate::utils::RecorderError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

/// Owns the transcoder lifecycle
pub struct RecordingSupervisor {
    state: RecorderState,

    locator: TranscoderLocator,

    launcher: Arc<dyn TranscoderLauncher>,

    /// URL markers of sources that must be re-encoded
    force_reencode_markers: Vec<String>,

    process: Option<Box<dyn TranscoderProcess>>,

    session: Option<RecordingSession>,

    stderr_task: Option<JoinHandle<()>>,

    /// The current logical attempt already used its re-encode retry
    retried: bool,
}

impl RecordingSupervisor {
    pub fn new(
        locator: TranscoderLocator,
        launcher: Arc<dyn TranscoderLauncher>,
        force_reencode_markers: Vec<String>,
    ) -> Self {
        Self {
            state: RecorderState::Idle,
            locator,
            launcher,
            force_reencode_markers,
            process: None,
            session: None,
            stderr_task: None,
            retried: false,
        }
    }

    /// Check that a transcoder executable can be found
    pub fn probe(&self) -> Result<PathBuf, RecorderError> {
        self.locator.resolve().map(|resolved| resolved.path)
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    /// Whether a transcoder process is owned
    pub fn is_active(&self) -> bool {
        self.process.is_some()
    }

    /// Start a new logical recording attempt
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, request: RecordingRequest) -> Result<(), RecorderError> {
        if self.state != RecorderState::Idle {
            return Err(RecorderError::NotIdle(self.state));
        }
        self.retried = false;
        self.launch(&request)
    }

    /// Re-attempt after a failed copy session, forcing re-encode
    pub fn retry(&mut self, request: RecordingRequest) -> Result<(), RecorderError> {
        if self.state != RecorderState::Idle {
            return Err(RecorderError::NotIdle(self.state));
        }
        let request = RecordingRequest {
            prefer_stream_copy: false,
            ..request
        };
        self.launch(&request)
    }

    fn launch(&mut self, request: &RecordingRequest) -> Result<(), RecorderError> {
        self.state = RecorderState::Starting;

        let resolved = match self.locator.resolve() {
            Ok(resolved) => resolved,
            Err(e) => {
                self.state = RecorderState::Error;
                return Err(e);
            }
        };

        let stream_copy = effective_stream_copy(
            &request.url,
            request.prefer_stream_copy,
            &self.force_reencode_markers,
        );
        let args = build_args(&TranscodeJob {
            url: &request.url,
            output_path: &request.output_path,
            stream_copy,
            low_latency: request.low_latency,
        });

        let ring = StderrRing::default();
        let session = RecordingSession::new(request, stream_copy, ring.clone());

        tracing::info!(
            session = %session.id,
            url = %request.url,
            output = ?request.output_path,
            stream_copy,
            low_latency = request.low_latency,
            "Starting transcoder"
        );
        tracing::debug!("Transcoder command: {:?} {:?}", resolved.path, args);

        let launched = match self.launcher.launch(&resolved.path, &args) {
            Ok(launched) => launched,
            Err(e) => {
                tracing::error!(session = %session.id, "Failed to spawn transcoder: {}", e);
                self.state = RecorderState::Error;
                return Err(RecorderError::Spawn(e));
            }
        };

        self.stderr_task = launched
            .stderr
            .map(|stderr| spawn_stderr_drain(stderr, ring));
        self.process = Some(launched.process);
        self.session = Some(session);
        Ok(())
    }

    /// Liveness, output size and stderr tail of the running transcoder
    pub fn check_status(&mut self) -> Option<TranscoderHealth> {
        if !matches!(self.state, RecorderState::Starting | RecorderState::Recording) {
            return None;
        }
        let process = self.process.as_mut()?;
        let session = self.session.as_ref()?;

        let output_bytes = std::fs::metadata(&session.output_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Some(TranscoderHealth {
            alive: !process.has_exited(),
            output_bytes,
            stderr_tail: session.stderr.tail(STDERR_TAIL_LINES),
        })
    }

    /// Promote a started session to recording
    pub fn finalize(&mut self, now: Instant) -> bool {
        if self.state != RecorderState::Starting {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.started_at = Some(now);
        self.state = RecorderState::Recording;
        tracing::info!(session = %session.id, "Recording confirmed: {:?}", session.output_path);
        true
    }

    /// Time spent recording; zero outside `Recording`
    pub fn elapsed(&self) -> Duration {
        if self.state != RecorderState::Recording {
            return Duration::ZERO;
        }
        self.session
            .as_ref()
            .and_then(|s| s.started_at)
            .map(|started| Instant::now().saturating_duration_since(started))
            .unwrap_or(Duration::ZERO)
    }

    /// Stop the transcoder, escalating quit -> terminate -> kill
    ///
    /// Always ends in `Idle` with the session cleared.
    pub async fn stop(&mut self) -> StopOutcome {
        let outcome = match self.process.take() {
            Some(mut process) => {
                self.state = RecorderState::Stopping;
                tracing::info!(session = ?self.session.as_ref().map(|s| s.id), "Stopping recording");
                shutdown(process.as_mut()).await
            }
            None => StopOutcome::Graceful,
        };

        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        self.session = None;
        self.state = RecorderState::Idle;
        outcome
    }

    /// Reclaim a failed session and decide whether to retry
    pub async fn handle_failure(&mut self) -> FailureAction {
        let Some(session) = self.session.clone() else {
            return FailureAction::Terminal;
        };

        for line in session.stderr.tail(STDERR_TAIL_LINES) {
            tracing::error!(session = %session.id, "FFmpeg: {}", line);
        }
        self.stop().await;

        if session.stream_copy && !self.retried {
            self.retried = true;
            tracing::warn!(session = %session.id, "Copy recording failed, retrying with re-encode");
            FailureAction::RetryWithReencode {
                url: session.url,
                low_latency: session.low_latency,
            }
        } else {
            tracing::error!(session = %session.id, "Recording failed permanently ({})", session.url);
            self.state = RecorderState::Error;
            FailureAction::Terminal
        }
    }

    /// Acknowledge a terminal error so a new attempt may start
    pub fn clear_error(&mut self) {
        if self.state == RecorderState::Error {
            self.state = RecorderState::Idle;
        }
    }
}

async fn shutdown(process: &mut dyn TranscoderProcess) -> StopOutcome {
    tracing::info!("Stopping transcoder pid {:?}", process.id());

    let graceful = timeout(STOP_GRACE, async {
        if let Err(e) = process.request_quit().await {
            tracing::debug!("Quit request not delivered: {}", e);
        }
        process.wait().await
    })
    .await;
    if graceful.is_ok() {
        return StopOutcome::Graceful;
    }

    tracing::warn!("Transcoder ignored quit, terminating");
    if let Err(e) = process.terminate() {
        tracing::warn!("Terminate failed: {}", e);
    }
    if timeout(STOP_GRACE, process.wait()).await.is_ok() {
        return StopOutcome::Terminated;
    }

    tracing::warn!("Transcoder ignored terminate, killing");
    if let Err(e) = process.kill() {
        tracing::error!("Kill failed: {}", e);
    }
    if timeout(KILL_REAP, process.wait()).await.is_err() {
        tracing::error!("Transcoder not reaped after kill");
    }
    StopOutcome::Killed
}
