//! Envelope types for the ingest log
//!
//! An [`Envelope`] is the unit written to the append-only log. Its `type` and
//! `payload` travel together as one adjacently tagged [`Reading`], so a
//! record whose type disagrees with its payload schema cannot be built and
//! fails to decode.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reading::Reading;

/// Kinds of reading carried by the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "temperature_condition")]
    Temperature,
    #[serde(rename = "traffic_condition")]
    Traffic,
}

impl EventType {
    /// Wire name used in the `type` field of an envelope
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Temperature => "temperature_condition",
            EventType::Traffic => "traffic_condition",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, typed, timestamped record in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// `type` + `payload`
    #[serde(flatten)]
    pub reading: Reading,

    /// Set once, at append time
    #[serde(rename = "datetime")]
    pub occurred_at: DateTime<Utc>,
}

impl Envelope {
    /// Wrap a reading, stamping it with the current time
    pub fn new(reading: Reading) -> Self {
        Self::with_timestamp(reading, Utc::now())
    }

    pub fn with_timestamp(reading: Reading, occurred_at: DateTime<Utc>) -> Self {
        Self {
            reading,
            occurred_at,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.reading.event_type()
    }

    pub fn trace_id(&self) -> &str {
        self.reading.trace_id()
    }

    /// Serialize to a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
