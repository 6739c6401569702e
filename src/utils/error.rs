//! Error types and handling
//!
//! Common error types used across the station.

use crate::recorder::RecorderState;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Station error: {0}")]
    Station(String),
}

/// Errors raised while loading settings or the channel list
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by the recording supervisor
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Recorder is busy ({0})")]
    NotIdle(RecorderState),

    #[error("Transcoder executable not found: {0}")]
    NotFound(String),

    #[error("Failed to spawn transcoder: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Transcoder stdin is not available")]
    StdinUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecorderError {
    /// Short operator-facing status for this failure
    ///
    /// Configuration problems and runtime problems read differently so an
    /// operator can tell a missing binary from a crashing one.
    pub fn status_text(&self) -> &'static str {
        match self {
            RecorderError::NotFound(_) => "FFMPEG ERROR: not found",
            RecorderError::Spawn(_) => "FFMPEG ERROR: spawn failed",
            _ => "FFMPEG ERROR",
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
