//! Sensor reading payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::EventType;

/// A temperature sample reported by a city sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    #[serde(rename = "eventID")]
    pub event_id: String,
    #[serde(rename = "sensorId")]
    pub sensor_id: String,
    pub temperature: f64,
    /// Sensor-reported time, distinct from the store's `date_created`
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "cityZone", default, skip_serializing_if = "Option::is_none")]
    pub city_zone: Option<String>,
    /// Assigned at ingest; clients never supply it
    #[serde(default)]
    pub trace_id: String,
}

/// A traffic density sample reported by a city sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficReading {
    #[serde(rename = "eventID")]
    pub event_id: String,
    #[serde(rename = "sensorId")]
    pub sensor_id: String,
    #[serde(rename = "trafficDensity")]
    pub traffic_density: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(
        rename = "incidentReport",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub incident_report: Option<String>,
    #[serde(default)]
    pub trace_id: String,
}

/// A reading of either kind, tagged the way it appears in an envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Reading {
    #[serde(rename = "temperature_condition")]
    Temperature(TemperatureReading),
    #[serde(rename = "traffic_condition")]
    Traffic(TrafficReading),
}

impl Reading {
    pub fn event_type(&self) -> EventType {
        match self {
            Reading::Temperature(_) => EventType::Temperature,
            Reading::Traffic(_) => EventType::Traffic,
        }
    }

    pub fn trace_id(&self) -> &str {
        match self {
            Reading::Temperature(r) => &r.trace_id,
            Reading::Traffic(r) => &r.trace_id,
        }
    }

    pub(crate) fn set_trace_id(&mut self, trace_id: String) {
        match self {
            Reading::Temperature(r) => r.trace_id = trace_id,
            Reading::Traffic(r) => r.trace_id = trace_id,
        }
    }

    /// The bare payload as served by the replay endpoints
    pub fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Reading::Temperature(r) => serde_json::to_value(r),
            Reading::Traffic(r) => serde_json::to_value(r),
        }
    }
}

impl From<TemperatureReading> for Reading {
    fn from(reading: TemperatureReading) -> Self {
        Reading::Temperature(reading)
    }
}

impl From<TrafficReading> for Reading {
    fn from(reading: TrafficReading) -> Self {
        Reading::Traffic(reading)
    }
}
