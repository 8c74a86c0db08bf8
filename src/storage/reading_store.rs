//! File-backed implementation of [`ReadingStore`]

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::types::{Reading, StoredRow, TemperatureRow, TrafficRow};

use super::table::RowTable;
use super::{InsertOutcome, ReadingStore, RowIndex, StoreConfig, StoreResult};

/// Two append-only JSONL tables with in-memory indexes
pub struct JsonlReadingStore {
    config: StoreConfig,
    temperature: RwLock<RowTable<TemperatureRow>>,
    traffic: RwLock<RowTable<TrafficRow>>,
}

impl JsonlReadingStore {
    /// Open both tables, rebuilding their indexes from disk
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let temperature = RowTable::open("temperature_events", config.temperature_path())?;
        let traffic = RowTable::open("traffic_events", config.traffic_path())?;

        info!(
            temperature_rows = temperature.len(),
            traffic_rows = traffic.len(),
            unique_trace_id = config.unique_trace_id,
            "Opened reading store"
        );

        Ok(Self {
            config,
            temperature: RwLock::new(temperature),
            traffic: RwLock::new(traffic),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Row counts as `(temperature, traffic)`
    pub fn row_counts(&self) -> (usize, usize) {
        (self.temperature.read().len(), self.traffic.read().len())
    }
}

/// Shared insert path for both tables
fn insert_row<R, F>(
    table: &RwLock<RowTable<R>>,
    unique_trace_id: bool,
    trace_id: &str,
    build: F,
) -> StoreResult<InsertOutcome>
where
    R: StoredRow + Clone + serde::Serialize + serde::de::DeserializeOwned,
    F: FnOnce(u64, DateTime<Utc>) -> R,
{
    let mut table = table.write();

    if unique_trace_id {
        if let Some(existing) = table.first_by_trace_id(trace_id) {
            debug!(trace_id, existing_id = existing.id(), "Ignoring duplicate trace_id");
            return Ok(InsertOutcome::Duplicate {
                existing_id: existing.id(),
            });
        }
    }

    let id = table.next_id();
    let row = build(id, table.next_date_created(Utc::now()));
    table.insert(row)?;

    Ok(InsertOutcome::Inserted { id })
}

impl ReadingStore for JsonlReadingStore {
    fn insert(&self, reading: &Reading) -> StoreResult<InsertOutcome> {
        let unique = self.config.unique_trace_id;

        let outcome = match reading {
            Reading::Temperature(r) => insert_row(&self.temperature, unique, &r.trace_id, |id, at| {
                TemperatureRow::from_reading(id, r, at)
            })?,
            Reading::Traffic(r) => insert_row(&self.traffic, unique, &r.trace_id, |id, at| {
                TrafficRow::from_reading(id, r, at)
            })?,
        };

        debug!(
            event_type = %reading.event_type(),
            trace_id = reading.trace_id(),
            ?outcome,
            "Stored event"
        );
        Ok(outcome)
    }

    fn temperature_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<TemperatureRow>> {
        let rows = self.temperature.read().between(start, end);
        debug!(%start, %end, found = rows.len(), "Queried temperature events");
        Ok(rows)
    }

    fn traffic_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<TrafficRow>> {
        let rows = self.traffic.read().between(start, end);
        debug!(%start, %end, found = rows.len(), "Queried traffic events");
        Ok(rows)
    }

    fn temperature_by(&self, index: RowIndex, value: &str) -> StoreResult<Vec<TemperatureRow>> {
        Ok(self.temperature.read().find_by(index, value))
    }

    fn traffic_by(&self, index: RowIndex, value: &str) -> StoreResult<Vec<TrafficRow>> {
        Ok(self.traffic.read().find_by(index, value))
    }
}
