//! Producer - the ingest boundary
//!
//! Validates an inbound reading, assigns its `trace_id` and appends it to
//! the log as an [`Envelope`]. A submission only succeeds once the log has
//! returned a position, so every acknowledged request is already durable.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::event_log::{EventLog, EventLogError};
use crate::types::{Envelope, Reading, TemperatureReading, TrafficReading};

/// Longest accepted value for any text field (the width of the row columns)
pub const MAX_FIELD_LEN: usize = 255;

/// Errors returned by [`Producer::submit`]
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// The reading was rejected before anything was appended
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// The log could not record the envelope
    #[error(transparent)]
    Transport(#[from] EventLogError),
}

pub type ProducerResult<T> = Result<T, ProducerError>;

/// A malformed reading
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("field `{0}` must not be empty")]
    Empty(&'static str),
    #[error("field `{field}` exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("temperature must be a finite number")]
    NonFiniteTemperature,
    #[error("traffic density must not be negative, got {0}")]
    NegativeDensity(i64),
}

/// Outcome of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub trace_id: String,
    pub position: u64,
}

/// Appends validated readings to the event log
#[derive(Clone)]
pub struct Producer {
    log: Arc<EventLog>,
}

impl Producer {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self { log }
    }

    /// Validate, stamp and append a single reading
    ///
    /// Performs exactly one append and never retries; any client-supplied
    /// `trace_id` is replaced.
    pub fn submit(&self, reading: impl Into<Reading>) -> ProducerResult<Submission> {
        let mut reading = reading.into();
        validate(&reading)?;

        let trace_id = Uuid::new_v4().to_string();
        reading.set_trace_id(trace_id.clone());
        let event_type = reading.event_type();

        info!(
            event_type = %event_type,
            trace_id = %trace_id,
            "Received event"
        );

        let envelope = Envelope::new(reading);
        let position = self.log.append(&envelope).map_err(|e| {
            warn!(event_type = %event_type, trace_id = %trace_id, error = %e, "Failed to append event");
            e
        })?;

        info!(
            event_type = %event_type,
            trace_id = %trace_id,
            position,
            "Event appended to log"
        );

        Ok(Submission { trace_id, position })
    }
}

/// Check a reading's fields without touching the log
pub fn validate(reading: &Reading) -> Result<(), ValidationError> {
    match reading {
        Reading::Temperature(r) => validate_temperature(r),
        Reading::Traffic(r) => validate_traffic(r),
    }
}

fn validate_temperature(r: &TemperatureReading) -> Result<(), ValidationError> {
    required("eventID", &r.event_id)?;
    required("sensorId", &r.sensor_id)?;
    optional("cityZone", r.city_zone.as_deref())?;
    if !r.temperature.is_finite() {
        return Err(ValidationError::NonFiniteTemperature);
    }
    Ok(())
}

fn validate_traffic(r: &TrafficReading) -> Result<(), ValidationError> {
    required("eventID", &r.event_id)?;
    required("sensorId", &r.sensor_id)?;
    optional("incidentReport", r.incident_report.as_deref())?;
    if r.traffic_density < 0 {
        return Err(ValidationError::NegativeDensity(r.traffic_density));
    }
    Ok(())
}

fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    optional(field, Some(value))
}

fn optional(field: &'static str, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.chars().count() > MAX_FIELD_LEN => Err(ValidationError::TooLong {
            field,
            max: MAX_FIELD_LEN,
        }),
        _ => Ok(()),
    }
}
