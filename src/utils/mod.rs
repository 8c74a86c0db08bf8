//! Utility functions and helpers
//!
//! Atomic file replacement and timestamp parsing.

pub mod atomic;
pub mod time;

pub use atomic::{atomic_write, atomic_write_json, cleanup_temp_files, AtomicError, AtomicResult};
pub use time::parse_timestamp;
