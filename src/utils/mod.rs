//! Shared utilities
//!
//! Error types, clock formatting and the deadline timer used by the
//! control loop.

pub mod error;
pub mod time;
pub mod timer;

pub use error::{AppError, AppResult, ConfigError, RecorderError};
pub use time::{file_timestamp_now, format_elapsed, hms_now, safe_filename, unique_base_name};
pub use timer::SingleShot;
