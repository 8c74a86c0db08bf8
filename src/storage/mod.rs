//! Storage Module
//!
//! Queryable persistence downstream of the log:
//! - `ReadingStore`: the row-store seam used by the consumer, the
//!   aggregator and the HTTP layer
//! - `JsonlReadingStore`: two append-only tables (`temperature_events`,
//!   `traffic_events`) indexed on `event_id`, `sensor_id` and `trace_id`
//! - `SummaryStore`: the singleton aggregate record

mod reading_store;
mod summary_store;
mod table;

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::types::{Reading, TemperatureRow, TrafficRow};
use crate::utils::AtomicError;

pub use reading_store::JsonlReadingStore;
pub use summary_store::SummaryStore;

/// Configuration for the persisted stores
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root data directory; tables live under `<data_dir>/store`
    pub data_dir: PathBuf,
    /// Treat `trace_id` as unique and ignore re-inserts of a known trace
    pub unique_trace_id: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            unique_trace_id: false,
        }
    }
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_unique_trace_id(mut self, unique: bool) -> Self {
        self.unique_trace_id = unique;
        self
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    pub fn temperature_path(&self) -> PathBuf {
        self.store_dir().join("temperature_events.jsonl")
    }

    pub fn traffic_path(&self) -> PathBuf {
        self.store_dir().join("traffic_events.jsonl")
    }

    pub fn stats_dir(&self) -> PathBuf {
        self.data_dir.join("stats")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.stats_dir().join("summary.json")
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing files could not be reached, read or written
    #[error("store transport error: {0}")]
    Transport(#[from] io::Error),
    #[error("store codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl From<AtomicError> for StoreError {
    fn from(e: AtomicError) -> Self {
        match e {
            AtomicError::Io(e) => StoreError::Transport(e),
            AtomicError::Json(e) => StoreError::Codec(e),
        }
    }
}

/// Secondary indexes maintained on both tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowIndex {
    EventId,
    SensorId,
    TraceId,
}

/// Result of inserting a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written
    Inserted { id: u64 },
    /// `trace_id` already present and the store enforces uniqueness
    Duplicate { existing_id: u64 },
}

/// Row store for persisted readings
///
/// Rows are immutable once inserted. Each `insert` is its own transaction:
/// when it returns `Ok`, the row is durable.
pub trait ReadingStore: Send + Sync {
    /// Persist one reading as one row, stamping `date_created`
    fn insert(&self, reading: &Reading) -> StoreResult<InsertOutcome>;

    /// Temperature rows with `date_created` in `[start, end)`
    fn temperature_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<TemperatureRow>>;

    /// Traffic rows with `date_created` in `[start, end)`
    fn traffic_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<TrafficRow>>;

    fn temperature_by(&self, index: RowIndex, value: &str) -> StoreResult<Vec<TemperatureRow>>;

    fn traffic_by(&self, index: RowIndex, value: &str) -> StoreResult<Vec<TrafficRow>>;
}
