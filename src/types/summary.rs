//! Aggregate statistics types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How far back the watermark of a freshly created summary starts
pub const INITIAL_LOOKBACK_MINUTES: i64 = 5;

/// Running aggregate over every persisted reading
///
/// `last_updated` is a watermark: every row with `date_created` before it
/// has already been folded in. Counters only grow and maxima never drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub num_temperature_readings: u64,
    pub max_temperature: f64,
    pub num_traffic_readings: u64,
    pub max_traffic_density: i64,
    pub last_updated: DateTime<Utc>,
}

impl Summary {
    /// Zero-valued summary whose watermark starts a few minutes before `now`
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            num_temperature_readings: 0,
            max_temperature: 0.0,
            num_traffic_readings: 0,
            max_traffic_density: 0,
            last_updated: now - Duration::minutes(INITIAL_LOOKBACK_MINUTES),
        }
    }

    /// Fold the readings of the closed window `[last_updated, window_end)`
    /// and advance the watermark to `window_end`.
    ///
    /// An empty window still advances the watermark.
    pub fn fold(&mut self, temperatures: &[f64], traffic_densities: &[i64], window_end: DateTime<Utc>) {
        if !temperatures.is_empty() {
            self.num_temperature_readings += temperatures.len() as u64;
            self.max_temperature = temperatures
                .iter()
                .copied()
                .fold(self.max_temperature, f64::max);
        }

        if let Some(max) = traffic_densities.iter().copied().max() {
            self.num_traffic_readings += traffic_densities.len() as u64;
            self.max_traffic_density = self.max_traffic_density.max(max);
        }

        if window_end > self.last_updated {
            self.last_updated = window_end;
        }
    }
}

/// Per-type counts over the whole ingest log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStats {
    pub num_temperature: u64,
    pub num_traffic: u64,
}
