//! Recording subsystem
//!
//! This module implements the transcoder-backed recorder:
//! - Executable discovery and the FFmpeg command line
//! - The process contract and the bounded stderr ring
//! - The health-check ladder that gates a new recording
//! - `RecordingSupervisor`, which owns the session

pub mod ffmpeg;
pub mod health;
pub mod process;
pub mod state;
pub mod supervisor;

pub use ffmpeg::{DiscoveryStrategy, ResolvedTranscoder, TranscoderLocator};
pub use health::{HealthCheckLadder, LadderFailure, LadderVerdict, TranscoderHealth};
pub use process::{StderrRing, SystemLauncher, TranscoderLauncher, TranscoderProcess};
pub use state::{
    FailureAction, RecorderState, RecordingIntent, RecordingRequest, RecordingSession,
    StopOutcome,
};
pub use supervisor::RecordingSupervisor;
