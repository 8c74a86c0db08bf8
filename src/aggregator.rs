//! Periodic aggregation over persisted readings
//!
//! Each tick folds the rows created in `[last_updated, now)` into the
//! [`Summary`] and moves the watermark to `now`. Windows are half-open and
//! adjacent, so a row is counted by exactly one tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::storage::{ReadingStore, StoreError, SummaryStore};
use crate::types::Summary;

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Time between ticks
    pub interval: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

pub type AggregatorResult<T> = Result<T, AggregatorError>;

/// Why a tick did not advance the watermark
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("failed to query readings: {0}")]
    Query(#[source] StoreError),
    #[error("failed to persist summary: {0}")]
    Persist(#[source] StoreError),
}

/// What one successful tick folded
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub temperature_readings: usize,
    pub traffic_readings: usize,
}

/// Sole owner of the [`Summary`] record
///
/// Run a single instance per summary; two aggregators folding the same
/// window would count it twice.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn ReadingStore>,
    summaries: SummaryStore,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(store: Arc<dyn ReadingStore>, summaries: SummaryStore, config: AggregatorConfig) -> Self {
        Self {
            store,
            summaries,
            config,
        }
    }

    pub fn summaries(&self) -> &SummaryStore {
        &self.summaries
    }

    pub fn tick(&self) -> AggregatorResult<TickOutcome> {
        self.tick_at(Utc::now())
    }

    /// Fold the window ending at `now`
    ///
    /// On any error the persisted summary is left as it was, so the same
    /// window is retried by the next tick.
    pub fn tick_at(&self, now: DateTime<Utc>) -> AggregatorResult<TickOutcome> {
        let mut summary = match self.summaries.load().map_err(AggregatorError::Query)? {
            Some(summary) => summary,
            None => {
                let summary = Summary::initial(now);
                self.summaries
                    .save(&summary)
                    .map_err(AggregatorError::Persist)?;
                info!(watermark = %summary.last_updated, "Created initial summary");
                summary
            }
        };

        let window_start = summary.last_updated;
        if now <= window_start {
            debug!(%window_start, %now, "Watermark is not behind the clock, nothing to fold");
            return Ok(TickOutcome {
                window_start,
                window_end: window_start,
                temperature_readings: 0,
                traffic_readings: 0,
            });
        }

        let temperatures: Vec<f64> = self
            .store
            .temperature_between(window_start, now)
            .map_err(AggregatorError::Query)?
            .iter()
            .map(|row| row.temperature)
            .collect();
        let densities: Vec<i64> = self
            .store
            .traffic_between(window_start, now)
            .map_err(AggregatorError::Query)?
            .iter()
            .map(|row| row.traffic_density)
            .collect();

        summary.fold(&temperatures, &densities, now);
        self.summaries
            .save(&summary)
            .map_err(AggregatorError::Persist)?;

        info!(
            %window_start,
            window_end = %now,
            temperature_readings = temperatures.len(),
            traffic_readings = densities.len(),
            max_temperature = summary.max_temperature,
            max_traffic_density = summary.max_traffic_density,
            "Aggregated window"
        );

        Ok(TickOutcome {
            window_start,
            window_end: now,
            temperature_readings: temperatures.len(),
            traffic_readings: densities.len(),
        })
    }

    /// Tick on the configured interval until `token` is cancelled
    ///
    /// Ticks never overlap: the next one waits for the previous to finish.
    pub async fn run(self, token: CancellationToken) {
        info!(interval = ?self.config.interval, "Aggregator running");

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    let aggregator = self.clone();
                    match tokio::task::spawn_blocking(move || aggregator.tick()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!(error = %e, "Aggregation tick failed"),
                        Err(e) => error!(error = %e, "Aggregation task panicked"),
                    }
                }
            }
        }

        info!("Aggregator stopped");
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }
}
