//! Data types for the sensor pipeline
//!
//! Wire payloads, log envelopes, persisted rows and aggregate records.

mod event;
mod reading;
mod row;
mod summary;

pub use event::{Envelope, EventType};
pub use reading::{Reading, TemperatureReading, TrafficReading};
pub use row::{StoredRow, TemperatureEventView, TemperatureRow, TrafficEventView, TrafficRow};
pub use summary::{LogStats, Summary, INITIAL_LOOKBACK_MINUTES};
