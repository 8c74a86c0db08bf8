//! Sensor Pipeline
//!
//! Ingests city-sensor readings over HTTP, sequences them through a durable
//! append-only log, persists them into queryable tables and periodically
//! folds them into an aggregate summary.
//!
//! # Features
//!
//! - **Durable Log**: fsynced JSON-line log with per-group committed offsets
//! - **At-Least-Once Persistence**: rows are written before offsets commit
//! - **Watermark Aggregation**: adjacent half-open windows, each row counted once
//! - **Replay Queries**: the Nth reading of a type, straight from the log
//!
//! # Modules
//!
//! - `types`: Readings, envelopes, stored rows and the summary
//! - `event_log`: Append-only log, lazy cursors and consumer-group offsets
//! - `producer`: Validating ingest into the log
//! - `replay`: Positional and counting scans over the log
//! - `storage`: Row store and summary persistence
//! - `consumer`: Committing consumer from log to store
//! - `aggregator`: Periodic summary folding
//! - `api`: Axum HTTP surface
//! - `config`: Service configuration
//! - `telemetry`: Logging setup
//! - `utils`: Atomic file writes and timestamp parsing
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sensor_pipeline::{EventLog, EventLogConfig, Producer, ReplayReader};
//! use sensor_pipeline::types::{EventType, TemperatureReading};
//!
//! let log = Arc::new(EventLog::open(EventLogConfig::new("data")).unwrap());
//! let producer = Producer::new(log.clone());
//! producer
//!     .submit(TemperatureReading {
//!         event_id: "evt-1".to_string(),
//!         sensor_id: "s1".to_string(),
//!         temperature: 21.5,
//!         timestamp: chrono::Utc::now(),
//!         city_zone: None,
//!         trace_id: String::new(),
//!     })
//!     .unwrap();
//!
//! let replay = ReplayReader::new(log);
//! assert!(replay.nth_of_type(EventType::Temperature, 0).unwrap().is_some());
//! ```

pub mod aggregator;
pub mod api;
pub mod config;
pub mod consumer;
pub mod event_log;
pub mod producer;
pub mod replay;
pub mod storage;
pub mod telemetry;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use aggregator::{Aggregator, AggregatorConfig, AggregatorError, TickOutcome};
pub use config::AppConfig;
pub use consumer::{CommittingConsumer, ConsumerConfig, ConsumerError, ConsumerState, CycleReport};
pub use event_log::{EventLog, EventLogConfig, EventLogError};
pub use producer::{Producer, ProducerError, Submission, ValidationError};
pub use replay::ReplayReader;
pub use storage::{JsonlReadingStore, ReadingStore, StoreConfig, StoreError, SummaryStore};
pub use types::{Envelope, EventType, LogStats, Reading, Summary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
