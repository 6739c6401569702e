//! Status board
//!
//! Deduplicates status messages and holds error statuses for a while so
//! routine tick statuses do not overwrite them immediately.

use super::events::StatusLine;
use crate::config::timing::ERROR_STATUS_HOLD;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct StatusBoard {
    current: Option<StatusLine>,
    hold_until: Option<Instant>,
    hold: Duration,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new(ERROR_STATUS_HOLD)
    }
}

impl StatusBoard {
    pub fn new(hold: Duration) -> Self {
        Self {
            current: None,
            hold_until: None,
            hold,
        }
    }

    pub fn current(&self) -> Option<&StatusLine> {
        self.current.as_ref()
    }

    /// Post a status caused by a command or an event
    ///
    /// Returns the line to publish, or `None` when nothing changed.
    pub fn post(&mut self, line: StatusLine, now: Instant) -> Option<StatusLine> {
        self.hold_until = line.error.then(|| now + self.hold);
        self.replace(line)
    }

    /// Post a status produced by the periodic reconciliation
    ///
    /// Suppressed while an error status is being held.
    pub fn post_routine(&mut self, line: StatusLine, now: Instant) -> Option<StatusLine> {
        if let Some(until) = self.hold_until {
            if now < until {
                return None;
            }
            self.hold_until = None;
        }
        self.replace(line)
    }

    fn replace(&mut self, line: StatusLine) -> Option<StatusLine> {
        if self.current.as_ref() == Some(&line) {
            return None;
        }
        self.current = Some(line.clone());
        Some(line)
    }
}
