//! Shared application state

use std::sync::Arc;

use crate::event_log::EventLog;
use crate::producer::Producer;
use crate::replay::ReplayReader;
use crate::storage::{ReadingStore, SummaryStore};

/// Handles shared by every request
pub struct AppState {
    /// Ingest path into the log
    pub producer: Producer,
    /// Positional and counting queries over the log
    pub replay: ReplayReader,
    /// Persisted rows for window queries
    pub store: Arc<dyn ReadingStore>,
    /// The aggregated summary
    pub summaries: SummaryStore,
}

impl AppState {
    pub fn new(
        log: Arc<EventLog>,
        store: Arc<dyn ReadingStore>,
        summaries: SummaryStore,
    ) -> Self {
        Self {
            producer: Producer::new(log.clone()),
            replay: ReplayReader::new(log),
            store,
            summaries,
        }
    }
}
