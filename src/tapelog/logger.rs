//! Append-only tape logger
//!
//! Bound to one recording's log file. Write failures are logged and never
//! returned; logging must not interrupt a recording.

use super::event::{EventKind, LogEvent};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Receives every formatted line for live display
pub type LineObserver = Box<dyn Fn(&str) + Send>;

pub struct TapeLogger {
    path: PathBuf,
    observer: Option<LineObserver>,
    last_line: Option<String>,
}

impl TapeLogger {
    pub fn new(path: impl Into<PathBuf>, observer: Option<LineObserver>) -> Self {
        Self {
            path: path.into(),
            observer,
            last_line: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format, append and mirror one event; returns the formatted line
    pub fn log_event(
        &mut self,
        kind: EventKind,
        track_info: &str,
        elapsed: Option<Duration>,
        suffix: Option<&str>,
    ) -> String {
        let line = LogEvent::now(kind, track_info, elapsed, suffix).to_string();

        if let Err(e) = self.append(&line) {
            tracing::error!("Tape log write to {:?} failed: {}", self.path, e);
        }
        if let Some(observer) = &self.observer {
            observer(&line);
        }

        self.last_line = Some(line.clone());
        line
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }

    /// The most recent formatted line
    pub fn last_line(&self) -> Option<&str> {
        self.last_line.as_deref()
    }
}
