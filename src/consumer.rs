//! Committing consumer
//!
//! Tails the event log for one consumer group and turns every envelope into
//! a stored row. The offset for a position is committed only after its row
//! insert has succeeded, so a crash between the two re-delivers the envelope
//! on restart (at-least-once).
//!
//! ```text
//! STARTING ──► TAILING ──► PERSISTING ──► commit ──► TAILING ──► …
//!                 ▲             │
//!                 └── failure ──┘  (no commit; same position next cycle)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::event_log::{EventLog, EventLogError};
use crate::storage::{InsertOutcome, ReadingStore, StoreError};

/// Configuration for a [`CommittingConsumer`]
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Consumer group whose committed offset is advanced
    pub group: String,
    /// How long one tail cycle waits for new records before returning
    pub poll_timeout: Duration,
    /// Pause after a failed cycle before retrying
    pub retry_delay: Duration,
    /// Maximum envelopes handled per cycle
    pub batch_size: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group: "event_group".to_string(),
            poll_timeout: Duration::from_millis(500),
            retry_delay: Duration::from_secs(1),
            batch_size: 100,
        }
    }
}

impl ConsumerConfig {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Default::default()
        }
    }
}

/// Where the consumer is in its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Starting,
    Tailing,
    Persisting,
}

/// Errors that end a consumer cycle early
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error(transparent)]
    Log(#[from] EventLogError),
    #[error("failed to persist envelope at position {position}: {source}")]
    Persist {
        position: u64,
        #[source]
        source: StoreError,
    },
}

/// What one tail cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Rows written
    pub persisted: usize,
    /// Envelopes the store reported as already present
    pub duplicates: usize,
    /// Undecodable records committed past
    pub skipped: usize,
    /// Highest position committed during the cycle
    pub last_committed: Option<u64>,
}

impl CycleReport {
    pub fn is_empty(&self) -> bool {
        self.persisted == 0 && self.duplicates == 0 && self.skipped == 0
    }
}

/// Long-lived log → store worker for one consumer group
pub struct CommittingConsumer {
    log: Arc<EventLog>,
    store: Arc<dyn ReadingStore>,
    config: ConsumerConfig,
    state: ConsumerState,
    /// Overrides the group's resume point on start
    start_override: Option<u64>,
    next_position: u64,
}

impl CommittingConsumer {
    pub fn new(log: Arc<EventLog>, store: Arc<dyn ReadingStore>, config: ConsumerConfig) -> Self {
        Self {
            log,
            store,
            config,
            state: ConsumerState::Starting,
            start_override: None,
            next_position: 0,
        }
    }

    /// Start from `position` instead of the group's committed offset
    ///
    /// Positions already committed are delivered again; the committed
    /// offset itself never moves backwards.
    pub fn with_start_position(mut self, position: u64) -> Self {
        self.start_override = Some(position);
        self
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Position the next cycle will read from
    pub fn next_position(&self) -> u64 {
        self.next_position
    }

    fn start(&mut self) -> Result<(), ConsumerError> {
        self.next_position = match self.start_override {
            Some(position) => position,
            None => self.log.resume_position(&self.config.group)?,
        };
        info!(
            group = %self.config.group,
            position = self.next_position,
            "Consumer starting"
        );
        self.state = ConsumerState::Tailing;
        Ok(())
    }

    /// Run one TAILING cycle: read what is available from the resume point,
    /// persisting and committing each envelope in order
    ///
    /// Stops at the first persist failure without committing it; the next
    /// cycle starts again from that position.
    pub fn poll_once(&mut self) -> Result<CycleReport, ConsumerError> {
        if self.state == ConsumerState::Starting {
            self.start()?;
        }

        let group = self.config.group.clone();
        let log = self.log.clone();
        let cursor = log.read_from(&group, Some(self.next_position), self.config.poll_timeout)?;
        let mut report = CycleReport::default();

        for item in cursor.take(self.config.batch_size) {
            let (position, envelope) = match item {
                Ok(record) => record,
                Err(EventLogError::Corrupt { position, reason }) => {
                    warn!(group = %group, position, %reason, "Skipping undecodable envelope");
                    self.commit(position, &mut report)?;
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            self.state = ConsumerState::Persisting;
            let outcome = self.store.insert(&envelope.reading);
            self.state = ConsumerState::Tailing;

            match outcome {
                Ok(InsertOutcome::Inserted { id }) => {
                    debug!(
                        group = %group,
                        position,
                        row_id = id,
                        event_type = %envelope.event_type(),
                        trace_id = envelope.trace_id(),
                        "Persisted envelope"
                    );
                    report.persisted += 1;
                }
                Ok(InsertOutcome::Duplicate { existing_id }) => {
                    debug!(
                        group = %group,
                        position,
                        existing_id,
                        trace_id = envelope.trace_id(),
                        "Envelope already persisted"
                    );
                    report.duplicates += 1;
                }
                Err(source) => {
                    error!(
                        group = %group,
                        position,
                        trace_id = envelope.trace_id(),
                        error = %source,
                        "Failed to persist envelope; offset not committed"
                    );
                    return Err(ConsumerError::Persist { position, source });
                }
            }

            self.commit(position, &mut report)?;
        }

        Ok(report)
    }

    fn commit(&mut self, position: u64, report: &mut CycleReport) -> Result<(), ConsumerError> {
        self.log.commit(&self.config.group, position)?;
        self.next_position = position + 1;
        report.last_committed = Some(position);
        Ok(())
    }

    /// Loop over tail cycles until `token` is cancelled
    ///
    /// Blocking; run it on a blocking thread (see [`CommittingConsumer::spawn`]).
    /// Cancellation is observed between cycles, so an in-flight
    /// persist-then-commit step finishes or is redelivered after restart.
    pub fn run(mut self, token: CancellationToken) {
        info!(group = %self.config.group, "Consumer running");

        while !token.is_cancelled() {
            match self.poll_once() {
                Ok(report) if report.is_empty() => {}
                Ok(report) => debug!(
                    group = %self.config.group,
                    persisted = report.persisted,
                    duplicates = report.duplicates,
                    skipped = report.skipped,
                    last_committed = ?report.last_committed,
                    "Consumer cycle complete"
                ),
                Err(e) => {
                    error!(group = %self.config.group, error = %e, "Consumer cycle failed");
                    std::thread::sleep(self.config.retry_delay);
                }
            }
        }

        info!(group = %self.config.group, position = self.next_position, "Consumer stopped");
    }

    /// Run the loop on tokio's blocking pool
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::task::spawn_blocking(move || self.run(token))
    }
}
