//! Tape log events and their line format

use crate::utils::{format_elapsed, hms_now};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of a tape log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Start,
    End,
    Crash,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "START",
            EventKind::End => "END",
            EventKind::Crash => "CRASH",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Forward padding flags so `{:<5}` works
        f.pad(self.as_str())
    }
}

/// One line of the tape log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Wall-clock time, `HH:MM:SS`
    pub wall_clock: String,
    /// Recording elapsed time when the event happened
    pub elapsed: Option<Duration>,
    pub kind: EventKind,
    pub track_info: String,
    pub suffix: Option<String>,
}

impl LogEvent {
    /// Stamp an event with the current wall-clock time
    pub fn now(
        kind: EventKind,
        track_info: impl Into<String>,
        elapsed: Option<Duration>,
        suffix: Option<&str>,
    ) -> Self {
        Self {
            wall_clock: hms_now(),
            elapsed,
            kind,
            track_info: track_info.into(),
            suffix: suffix.filter(|s| !s.is_empty()).map(str::to_string),
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = format_elapsed(self.elapsed.unwrap_or(Duration::ZERO));
        write!(
            f,
            "[{}] [{}] {:<5} {}",
            self.wall_clock, elapsed, self.kind, self.track_info
        )?;
        if let Some(suffix) = &self.suffix {
            write!(f, " ({})", suffix)?;
        }
        Ok(())
    }
}
