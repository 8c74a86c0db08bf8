//! Persisted rows and the projections served from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reading::{TemperatureReading, TrafficReading};

/// Row in the `temperature_events` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRow {
    pub id: u64,
    pub event_id: String,
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    #[serde(default)]
    pub city_zone: Option<String>,
    /// Server-assigned persistence time
    pub date_created: DateTime<Utc>,
    pub trace_id: String,
}

impl TemperatureRow {
    pub fn from_reading(id: u64, reading: &TemperatureReading, date_created: DateTime<Utc>) -> Self {
        Self {
            id,
            event_id: reading.event_id.clone(),
            sensor_id: reading.sensor_id.clone(),
            timestamp: reading.timestamp,
            temperature: reading.temperature,
            city_zone: reading.city_zone.clone(),
            date_created,
            trace_id: reading.trace_id.clone(),
        }
    }
}

/// Row in the `traffic_events` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRow {
    pub id: u64,
    pub event_id: String,
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    pub traffic_density: i64,
    #[serde(default)]
    pub incident_report: Option<String>,
    pub date_created: DateTime<Utc>,
    pub trace_id: String,
}

impl TrafficRow {
    pub fn from_reading(id: u64, reading: &TrafficReading, date_created: DateTime<Utc>) -> Self {
        Self {
            id,
            event_id: reading.event_id.clone(),
            sensor_id: reading.sensor_id.clone(),
            timestamp: reading.timestamp,
            traffic_density: reading.traffic_density,
            incident_report: reading.incident_report.clone(),
            date_created,
            trace_id: reading.trace_id.clone(),
        }
    }
}

/// Common accessors the row tables index on
pub trait StoredRow {
    fn id(&self) -> u64;
    fn event_id(&self) -> &str;
    fn sensor_id(&self) -> &str;
    fn trace_id(&self) -> &str;
    fn date_created(&self) -> DateTime<Utc>;
}

macro_rules! impl_stored_row {
    ($row:ty) => {
        impl StoredRow for $row {
            fn id(&self) -> u64 {
                self.id
            }
            fn event_id(&self) -> &str {
                &self.event_id
            }
            fn sensor_id(&self) -> &str {
                &self.sensor_id
            }
            fn trace_id(&self) -> &str {
                &self.trace_id
            }
            fn date_created(&self) -> DateTime<Utc> {
                self.date_created
            }
        }
    };
}

impl_stored_row!(TemperatureRow);
impl_stored_row!(TrafficRow);

/// Temperature row as returned by `GET /events/temperature`
///
/// `timestamp` here is the row's `date_created`: the window query and its
/// consumers work on persistence time, not sensor time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureEventView {
    pub trace_id: String,
    #[serde(rename = "sensorId")]
    pub sensor_id: String,
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "cityZone")]
    pub city_zone: Option<String>,
}

impl From<&TemperatureRow> for TemperatureEventView {
    fn from(row: &TemperatureRow) -> Self {
        Self {
            trace_id: row.trace_id.clone(),
            sensor_id: row.sensor_id.clone(),
            temperature: row.temperature,
            timestamp: row.date_created,
            city_zone: row.city_zone.clone(),
        }
    }
}

/// Traffic row as returned by `GET /events/traffic`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficEventView {
    pub trace_id: String,
    #[serde(rename = "sensorId")]
    pub sensor_id: String,
    #[serde(rename = "trafficDensity")]
    pub traffic_density: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "incidentReport")]
    pub incident_report: Option<String>,
}

impl From<&TrafficRow> for TrafficEventView {
    fn from(row: &TrafficRow) -> Self {
        Self {
            trace_id: row.trace_id.clone(),
            sensor_id: row.sensor_id.clone(),
            traffic_density: row.traffic_density,
            timestamp: row.date_created,
            incident_report: row.incident_report.clone(),
        }
    }
}
