//! Recording state management
//!
//! Defines the recorder state machine, the per-attempt session record and
//! the intent signal shown at the UI boundary.

use super::process::StderrRing;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::time::Instant;
use uuid::Uuid;

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No transcoder running
    #[default]
    Idle,
    /// Transcoder spawned, health checks still running
    Starting,
    /// Health checks passed, recording is trusted
    Recording,
    /// Shutdown in progress
    Stopping,
    /// Start failed before a transcoder was running
    Error,
}

impl RecorderState {
    /// States in which a transcoder process exists
    pub fn has_process(&self) -> bool {
        matches!(
            self,
            RecorderState::Starting | RecorderState::Recording | RecorderState::Stopping
        )
    }

    /// States where the displayed indicator may lag behind the truth
    pub fn is_transient(&self) -> bool {
        matches!(self, RecorderState::Starting | RecorderState::Stopping)
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecorderState::Idle => "IDLE",
            RecorderState::Starting => "STARTING",
            RecorderState::Recording => "RECORDING",
            RecorderState::Stopping => "STOPPING",
            RecorderState::Error => "ERROR",
        };
        write!(f, "{}", name)
    }
}

/// Parameters of one recording attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingRequest {
    pub url: String,
    pub output_path: PathBuf,
    pub log_path: PathBuf,
    pub prefer_stream_copy: bool,
    pub low_latency: bool,
}

/// A live recording attempt
///
/// Exists from a successful spawn until the attempt is stopped or fails.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    /// Correlation id for diagnostics
    pub id: Uuid,

    pub output_path: PathBuf,

    pub log_path: PathBuf,

    pub url: String,

    /// Whether this attempt actually uses passthrough copy
    pub stream_copy: bool,

    pub low_latency: bool,

    /// Stamped when the health checks pass
    pub started_at: Option<Instant>,

    /// Most recent transcoder diagnostics
    pub stderr: StderrRing,
}

impl RecordingSession {
    pub fn new(request: &RecordingRequest, stream_copy: bool, stderr: StderrRing) -> Self {
        Self {
            id: Uuid::new_v4(),
            output_path: request.output_path.clone(),
            log_path: request.log_path.clone(),
            url: request.url.clone(),
            stream_copy,
            low_latency: request.low_latency,
            started_at: None,
            stderr,
        }
    }
}

/// Recording as the UI should present it
///
/// Decouples the immediate feedback of a record toggle from the
/// recorder's authoritative state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingIntent {
    /// Not recording
    #[default]
    Off,
    /// Asked for, health checks pending
    Requested,
    /// Recording confirmed by the health checks
    Confirmed,
    /// The last attempt failed terminally
    Failed,
}

impl RecordingIntent {
    /// Whether the record indicator should be lit
    pub fn shows_recording(&self) -> bool {
        matches!(self, RecordingIntent::Requested | RecordingIntent::Confirmed)
    }
}

/// How a stop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The transcoder honoured the quit request, or nothing was running
    Graceful,
    /// The transcoder needed a terminate signal
    Terminated,
    /// The transcoder had to be killed
    Killed,
}

impl StopOutcome {
    /// Only a forced kill counts as an unclean stop
    pub fn is_clean(&self) -> bool {
        !matches!(self, StopOutcome::Killed)
    }
}

/// What the caller should do after a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureAction {
    /// The failed attempt used stream copy; retry once with re-encoding
    RetryWithReencode { url: String, low_latency: bool },
    /// No further automatic retries
    Terminal,
}
