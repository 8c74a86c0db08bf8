//! Event Log Module
//!
//! The durable, append-only sequence every reading passes through:
//! - `EventLog`: single-partition JSONL log with positional reads
//! - `LogCursor`: lazy, timeout-bounded iterator over `(position, envelope)`
//! - consumer-group offsets, committed atomically per group
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌──────────┐    ┌────────────────────┐    ┌────────────────────┐
//! │ Producer │───►│ append + fsync     │───►│ notify waiting     │
//! │ submit() │    │ events.jsonl line  │    │ cursors (Condvar)  │
//! └──────────┘    └────────────────────┘    └────────────────────┘
//!
//! Read Path:
//! ┌─────────────────────┐    ┌──────────────────┐    ┌──────────────────┐
//! │ read_from(group,    │───►│ seek to record   │───►│ commit(group,    │
//! │ start | committed+1)│    │ offset, decode   │    │ position)        │
//! └─────────────────────┘    └──────────────────┘    └──────────────────┘
//! ```

mod cursor;
mod offsets;
mod store;

pub use cursor::LogCursor;
pub use offsets::OffsetRecord;
pub use store::{EventLog, EventLogConfig, EventLogError, EventLogResult};
