//! Recording health-check ladder
//!
//! Pure-logic sequence of delayed checks run after a transcoder starts.
//! A recording is trusted only after every step passes.

use crate::config::recording::{HEALTH_CHECK_INTERVAL, HEALTH_CHECK_STEPS};
use crate::utils::SingleShot;
use std::time::Duration;
use tokio::time::Instant;

/// Snapshot returned by a status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscoderHealth {
    /// The process has not exited
    pub alive: bool,
    /// Current size of the output file
    pub output_bytes: u64,
    /// Most recent stderr lines
    pub stderr_tail: Vec<String>,
}

/// Why the ladder gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderFailure {
    /// The transcoder died during the checks
    ProcessExited,
    /// The output file was still empty after the final step
    NoOutput,
}

impl LadderFailure {
    pub fn describe(&self) -> &'static str {
        match self {
            LadderFailure::ProcessExited => "process exited",
            LadderFailure::NoOutput => "0 bytes written",
        }
    }
}

/// Result of one ladder step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderVerdict {
    /// More steps to go
    Continue,
    /// Final step passed
    Passed,
    /// Terminal failure
    Failed(LadderFailure),
}

/// Step counter plus the timer that paces it
#[derive(Debug, Clone)]
pub struct HealthCheckLadder {
    step: u8,
    steps: u8,
    interval: Duration,
    timer: SingleShot,
}

impl Default for HealthCheckLadder {
    fn default() -> Self {
        Self::new(HEALTH_CHECK_STEPS, HEALTH_CHECK_INTERVAL)
    }
}

impl HealthCheckLadder {
    pub fn new(steps: u8, interval: Duration) -> Self {
        Self {
            step: 0,
            steps: steps.max(1),
            interval,
            timer: SingleShot::new(),
        }
    }

    /// Reset and schedule the first step
    pub fn arm(&mut self, now: Instant) {
        self.step = 0;
        self.timer.start(now, self.interval);
    }

    /// Abandon the ladder
    pub fn cancel(&mut self) {
        self.step = 0;
        self.timer.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_active()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Steps completed so far
    pub fn step(&self) -> u8 {
        self.step
    }

    /// Whether a step is due now
    pub fn fire(&mut self, now: Instant) -> bool {
        self.timer.fire(now)
    }

    /// Judge one step and schedule the next when the verdict is `Continue`
    pub fn evaluate(&mut self, health: &TranscoderHealth, now: Instant) -> LadderVerdict {
        self.step = self.step.saturating_add(1);

        let verdict = if !health.alive {
            LadderVerdict::Failed(LadderFailure::ProcessExited)
        } else if self.step >= self.steps {
            if health.output_bytes == 0 {
                LadderVerdict::Failed(LadderFailure::NoOutput)
            } else {
                LadderVerdict::Passed
            }
        } else {
            LadderVerdict::Continue
        };

        tracing::debug!(
            "Health check {}/{}: alive={}, bytes={} -> {:?}",
            self.step,
            self.steps,
            health.alive,
            health.output_bytes,
            verdict
        );

        match verdict {
            LadderVerdict::Continue => self.timer.start(now, self.interval),
            _ => self.timer.cancel(),
        }
        verdict
    }
}
