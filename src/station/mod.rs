//! The application session
//!
//! `Station` owns both supervisors and runs the control loop; the display
//! layer talks to it through a `StationHandle` and mirrors its
//! `StationEvent`s.

pub mod commands;
pub mod core;
pub mod events;
pub mod status;

pub use self::core::Station;
pub use commands::{StationCommand, StationHandle};
pub use events::{StationEvent, StatusLine};
pub use status::StatusBoard;
