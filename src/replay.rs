//! Replay queries over the ingest log
//!
//! Every query re-reads the log from position 0 up to the length it had when
//! the query started; there is no persisted index. Cost is linear in log
//! length.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::event_log::{EventLog, EventLogError, EventLogResult, LogCursor};
use crate::types::{Envelope, EventType, LogStats, Reading};

/// Stateless, read-only scanner for positional and counting queries
#[derive(Clone)]
pub struct ReplayReader {
    log: Arc<EventLog>,
}

impl ReplayReader {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self { log }
    }

    /// Payload of the `n`th (zero-based) envelope of `event_type`, in append
    /// order, or `None` when the log has fewer matching envelopes
    pub fn nth_of_type(&self, event_type: EventType, n: u64) -> EventLogResult<Option<Reading>> {
        debug!(event_type = %event_type, index = n, "Replaying log for indexed lookup");

        let mut seen = 0u64;
        for envelope in decoded(self.log.scan()) {
            let envelope = envelope?;
            if envelope.event_type() != event_type {
                continue;
            }
            if seen == n {
                return Ok(Some(envelope.reading));
            }
            seen += 1;
        }

        warn!(event_type = %event_type, index = n, "No event found at index");
        Ok(None)
    }

    /// Number of envelopes of each type in the whole log
    pub fn stats(&self) -> EventLogResult<LogStats> {
        let mut stats = LogStats::default();

        for envelope in decoded(self.log.scan()) {
            match envelope?.event_type() {
                EventType::Temperature => stats.num_temperature += 1,
                EventType::Traffic => stats.num_traffic += 1,
            }
        }

        info!(
            num_temperature = stats.num_temperature,
            num_traffic = stats.num_traffic,
            "Computed log statistics"
        );
        Ok(stats)
    }
}

/// Drop undecodable records, keep transport failures
fn decoded(cursor: LogCursor<'_>) -> impl Iterator<Item = EventLogResult<Envelope>> + '_ {
    cursor.filter_map(|item| match item {
        Ok((_, envelope)) => Some(Ok(envelope)),
        Err(EventLogError::Corrupt { position, reason }) => {
            warn!(position, %reason, "Skipping undecodable record during replay");
            None
        }
        Err(e) => Some(Err(e)),
    })
}
