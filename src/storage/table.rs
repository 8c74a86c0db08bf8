//! Append-only JSONL row table with in-memory secondary indexes

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::types::StoredRow;

use super::{RowIndex, StoreError, StoreResult};

/// One persisted table
///
/// Rows are kept in insertion order, which is also `date_created` order, so
/// time-window queries are two binary searches.
pub(crate) struct RowTable<R> {
    name: &'static str,
    path: PathBuf,
    file: File,
    end: u64,
    rows: Vec<R>,
    by_event_id: HashMap<String, Vec<usize>>,
    by_sensor_id: HashMap<String, Vec<usize>>,
    by_trace_id: HashMap<String, Vec<usize>>,
}

impl<R> RowTable<R>
where
    R: StoredRow + Clone + Serialize + DeserializeOwned,
{
    pub(crate) fn open(name: &'static str, path: PathBuf) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let mut table = Self {
            name,
            path,
            file,
            end: 0,
            rows: Vec::new(),
            by_event_id: HashMap::new(),
            by_sensor_id: HashMap::new(),
            by_trace_id: HashMap::new(),
        };
        table.load()?;

        info!(table = name, rows = table.rows.len(), "Opened row table");
        Ok(table)
    }

    fn load(&mut self) -> StoreResult<()> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut line = String::new();
        let mut line_num = 0usize;

        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 || !line.ends_with('\n') {
                break;
            }
            line_num += 1;
            self.end += read as u64;

            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<R>(line.trim_end()) {
                Ok(row) => self.index_row(row),
                Err(e) => warn!(
                    table = self.name,
                    line = line_num,
                    error = %e,
                    "Failed to parse stored row, skipping"
                ),
            }
        }

        let file_len = self.file.metadata()?.len();
        if file_len > self.end {
            warn!(
                table = self.name,
                torn_bytes = file_len - self.end,
                "Truncating partial row at the tail of the table"
            );
            self.file.set_len(self.end)?;
            self.file.sync_all()?;
        }

        Ok(())
    }

    fn index_row(&mut self, row: R) {
        let slot = self.rows.len();
        self.by_event_id
            .entry(row.event_id().to_string())
            .or_default()
            .push(slot);
        self.by_sensor_id
            .entry(row.sensor_id().to_string())
            .or_default()
            .push(slot);
        self.by_trace_id
            .entry(row.trace_id().to_string())
            .or_default()
            .push(slot);
        self.rows.push(row);
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.rows.last().map(|r| r.id() + 1).unwrap_or(1)
    }

    /// Persistence timestamp for the next row; never earlier than the last
    pub(crate) fn next_date_created(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.rows.last() {
            Some(last) if last.date_created() > now => last.date_created(),
            _ => now,
        }
    }

    /// Append one row as a single fsynced line
    ///
    /// This is the unit of atomicity: on failure the table is rolled back
    /// and neither the file nor the indexes contain the row.
    pub(crate) fn insert(&mut self, row: R) -> StoreResult<()> {
        let mut line = serde_json::to_string(&row)?;
        line.push('\n');

        let start = self.end;
        let written = self
            .file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.sync_data());
        if let Err(e) = written {
            if let Err(truncate_err) = self.file.set_len(start) {
                warn!(table = self.name, error = %truncate_err, "Failed to roll back partial row");
            }
            return Err(StoreError::Transport(e));
        }

        self.end = start + line.len() as u64;
        self.index_row(row);
        Ok(())
    }

    /// Rows whose `date_created` lies in `[start, end)`
    pub(crate) fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<R> {
        if start >= end {
            return Vec::new();
        }
        let lo = self.rows.partition_point(|r| r.date_created() < start);
        let hi = self.rows.partition_point(|r| r.date_created() < end);
        self.rows[lo..hi].to_vec()
    }

    pub(crate) fn find_by(&self, index: RowIndex, value: &str) -> Vec<R> {
        let map = match index {
            RowIndex::EventId => &self.by_event_id,
            RowIndex::SensorId => &self.by_sensor_id,
            RowIndex::TraceId => &self.by_trace_id,
        };
        map.get(value)
            .map(|slots| slots.iter().map(|&i| self.rows[i].clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn first_by_trace_id(&self, trace_id: &str) -> Option<&R> {
        self.by_trace_id
            .get(trace_id)
            .and_then(|slots| slots.first())
            .map(|&i| &self.rows[i])
    }
}
