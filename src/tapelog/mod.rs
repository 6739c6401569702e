//! Per-recording track log
//!
//! One text file per recording, one line per START/END/CRASH event.

pub mod event;
pub mod logger;

pub use event::{EventKind, LogEvent};
pub use logger::{LineObserver, TapeLogger};
