//! Event Log - durable append-only envelope log
//!
//! Envelopes are stored one JSON line each in `events.jsonl`. A record's
//! position is its zero-based line number. The log keeps the byte offset of
//! every record in memory so a reader can seek straight to any position.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::types::Envelope;
use crate::utils::AtomicError;

use super::cursor::LogCursor;
use super::offsets::OffsetStore;

/// Configuration for the EventLog
#[derive(Debug, Clone)]
pub struct EventLogConfig {
    /// Root data directory; the log lives under `<data_dir>/log`
    pub data_dir: PathBuf,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl EventLogConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Get path to the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("log")
    }

    /// Get path to events.jsonl
    pub fn events_path(&self) -> PathBuf {
        self.log_dir().join("events.jsonl")
    }

    /// Get path to the consumer-group offsets directory
    pub fn offsets_dir(&self) -> PathBuf {
        self.data_dir.join("offsets")
    }
}

/// Result type for EventLog operations
pub type EventLogResult<T> = Result<T, EventLogError>;

/// Errors that can occur in EventLog operations
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    /// The log file could not be reached, read or written
    #[error("event log transport error: {0}")]
    Transport(#[from] io::Error),
    #[error("event log codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("corrupt record at position {position}: {reason}")]
    Corrupt { position: u64, reason: String },
    #[error("position {position} is beyond the end of the log ({len} records)")]
    OutOfRange { position: u64, len: u64 },
    #[error("invalid consumer group name: {0:?}")]
    InvalidGroup(String),
}

impl From<AtomicError> for EventLogError {
    fn from(e: AtomicError) -> Self {
        match e {
            AtomicError::Io(e) => EventLogError::Transport(e),
            AtomicError::Json(e) => EventLogError::Codec(e),
        }
    }
}

struct LogState {
    file: File,
    /// Byte offset at which each record starts, indexed by position
    record_offsets: Vec<u64>,
    /// Byte length of all complete records
    end: u64,
    /// Set when a failed append could not be rolled back; the file no
    /// longer matches `record_offsets`, so further appends are refused
    poisoned: bool,
}

/// The EventLog: single-partition append-only record store with
/// consumer-group offset tracking
///
/// Appends from any number of threads are serialized internally; readers
/// never block writers for longer than it takes to copy an offset.
pub struct EventLog {
    config: EventLogConfig,
    state: Mutex<LogState>,
    appended: Condvar,
    offsets: OffsetStore,
}

impl EventLog {
    /// Open (or create) the log described by `config`
    ///
    /// Rebuilds the position index by scanning the file. A trailing partial
    /// line left by a crash mid-append is truncated away.
    pub fn open(config: EventLogConfig) -> EventLogResult<Self> {
        let events_path = config.events_path();
        std::fs::create_dir_all(config.log_dir())?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&events_path)?;

        let (record_offsets, end) = scan_records(&events_path)?;
        let file_len = file.metadata()?.len();
        if file_len > end {
            warn!(
                path = %events_path.display(),
                torn_bytes = file_len - end,
                "Truncating partial record at the tail of the event log"
            );
            file.set_len(end)?;
            file.sync_all()?;
        }

        let offsets = OffsetStore::open(config.offsets_dir())?;

        info!(
            path = %events_path.display(),
            records = record_offsets.len(),
            "Opened event log"
        );

        Ok(Self {
            config,
            state: Mutex::new(LogState {
                file,
                record_offsets,
                end,
                poisoned: false,
            }),
            appended: Condvar::new(),
            offsets,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &EventLogConfig {
        &self.config
    }

    /// Number of records in the log
    pub fn len(&self) -> u64 {
        self.state.lock().record_offsets.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an envelope and return its position
    ///
    /// The record is fsynced before this returns. On failure nothing is
    /// recorded and the caller must not assume otherwise.
    pub fn append(&self, envelope: &Envelope) -> EventLogResult<u64> {
        let mut line = envelope.to_json_line()?;
        line.push('\n');

        let mut state = self.state.lock();
        if state.poisoned {
            return Err(EventLogError::Transport(io::Error::new(
                io::ErrorKind::Other,
                "event log is poisoned by a failed rollback; reopen to repair",
            )));
        }
        let start = state.end;

        if let Err(e) = write_record(&mut state.file, line.as_bytes()) {
            // Drop whatever part of the record made it to disk.
            if let Err(truncate_err) = state.file.set_len(start) {
                error!(
                    error = %truncate_err,
                    end = start,
                    "Failed to roll back partial append; refusing further appends"
                );
                state.poisoned = true;
            }
            return Err(EventLogError::Transport(e));
        }

        let position = state.record_offsets.len() as u64;
        state.record_offsets.push(start);
        state.end = start + line.len() as u64;
        drop(state);

        self.appended.notify_all();

        debug!(
            position,
            event_type = %envelope.event_type(),
            trace_id = envelope.trace_id(),
            "Appended envelope"
        );

        Ok(position)
    }

    /// Read lazily from `start`, or from the group's resume point when
    /// `start` is `None`
    ///
    /// The resume point is one past the last committed position. A group
    /// that has never committed starts at the current end of the log, so new
    /// groups do not replay history. The returned cursor ends once it has
    /// waited `timeout` at the tail without a new append.
    pub fn read_from(
        &self,
        group: &str,
        start: Option<u64>,
        timeout: Duration,
    ) -> EventLogResult<LogCursor<'_>> {
        let start = match start {
            Some(position) => position,
            None => self.resume_position(group)?,
        };
        Ok(LogCursor::new(self, start, timeout))
    }

    /// Scan every record present when the scan starts, independent of any
    /// group
    ///
    /// Records appended during the scan are not visited, so the scan always
    /// ends no matter how fast the log grows.
    pub fn scan(&self) -> LogCursor<'_> {
        LogCursor::bounded(self, 0, self.len())
    }

    /// Where `read_from(group, None, ..)` would start
    pub fn resume_position(&self, group: &str) -> EventLogResult<u64> {
        Ok(match self.offsets.committed(group)? {
            Some(position) => position + 1,
            None => self.len(),
        })
    }

    /// Persist `position` as the group's last consumed record
    ///
    /// Offsets never regress: committing a position at or before the current
    /// one is a no-op. Returns the group's committed position afterwards.
    pub fn commit(&self, group: &str, position: u64) -> EventLogResult<u64> {
        let len = self.len();
        if position >= len {
            return Err(EventLogError::OutOfRange { position, len });
        }
        self.offsets.commit(group, position)
    }

    /// Last committed position for `group`, if any
    pub fn committed(&self, group: &str) -> EventLogResult<Option<u64>> {
        self.offsets.committed(group)
    }

    /// Byte length of all indexed records
    pub(crate) fn indexed_end(&self) -> u64 {
        self.state.lock().end
    }

    /// Byte offset of the record at `position`, waiting up to `timeout` for
    /// it to be appended
    pub(crate) fn wait_for_record(&self, position: u64, timeout: Duration) -> Option<u64> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            if let Some(offset) = state.record_offsets.get(position as usize) {
                return Some(*offset);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            self.appended.wait_for(&mut state, deadline - now);
        }
    }
}

fn write_record(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.sync_data()
}

/// Find the start of every complete (newline-terminated) record
fn scan_records(path: &Path) -> EventLogResult<(Vec<u64>, u64)> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut offsets = Vec::new();
    let mut buf = Vec::new();
    let mut pos = 0u64;

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 || buf.last() != Some(&b'\n') {
            break;
        }
        offsets.push(pos);
        pos += read as u64;
    }

    Ok((offsets, pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Reading, TemperatureReading, TrafficReading};
    use chrono::Utc;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn temperature(value: f64) -> Envelope {
        Envelope::new(Reading::Temperature(TemperatureReading {
            event_id: format!("evt-{}", value),
            sensor_id: "s1".to_string(),
            temperature: value,
            timestamp: Utc::now(),
            city_zone: None,
            trace_id: format!("trace-{}", value),
        }))
    }

    fn traffic(density: i64) -> Envelope {
        Envelope::new(Reading::Traffic(TrafficReading {
            event_id: format!("evt-{}", density),
            sensor_id: "s2".to_string(),
            traffic_density: density,
            timestamp: Utc::now(),
            incident_report: None,
            trace_id: format!("trace-{}", density),
        }))
    }

    fn create_test_log() -> (EventLog, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::open(EventLogConfig::new(temp_dir.path())).unwrap();
        (log, temp_dir)
    }

    #[test]
    fn test_append_assigns_sequential_positions() {
        let (log, _temp_dir) = create_test_log();

        assert!(log.is_empty());
        assert_eq!(log.append(&temperature(1.0)).unwrap(), 0);
        assert_eq!(log.append(&traffic(5)).unwrap(), 1);
        assert_eq!(log.append(&temperature(2.0)).unwrap(), 2);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_read_from_returns_append_order() {
        let (log, _temp_dir) = create_test_log();
        let envelopes = vec![temperature(1.0), traffic(5), temperature(2.0)];
        for envelope in &envelopes {
            log.append(envelope).unwrap();
        }

        let read: Vec<(u64, Envelope)> = log
            .read_from("g", Some(0), Duration::ZERO)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(read.len(), 3);
        for (i, (position, envelope)) in read.iter().enumerate() {
            assert_eq!(*position, i as u64);
            assert_eq!(envelope, &envelopes[i]);
        }

        // Restartable from any prior position
        let tail: Vec<u64> = log
            .read_from("g", Some(1), Duration::ZERO)
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(tail, vec![1, 2]);
    }

    #[test]
    fn test_new_group_starts_at_latest() {
        let (log, _temp_dir) = create_test_log();
        log.append(&temperature(1.0)).unwrap();

        assert_eq!(log.resume_position("fresh").unwrap(), 1);
        let read: Vec<_> = log
            .read_from("fresh", None, Duration::ZERO)
            .unwrap()
            .collect();
        assert!(read.is_empty());
    }

    #[test]
    fn test_commit_resumes_after_committed_position() {
        let (log, _temp_dir) = create_test_log();
        for v in 0..4 {
            log.append(&temperature(v as f64)).unwrap();
        }

        log.commit("g", 1).unwrap();

        let positions: Vec<u64> = log
            .read_from("g", None, Duration::ZERO)
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(positions, vec![2, 3]);
    }

    #[test]
    fn test_commit_never_regresses() {
        let (log, _temp_dir) = create_test_log();
        for v in 0..3 {
            log.append(&temperature(v as f64)).unwrap();
        }

        assert_eq!(log.commit("g", 2).unwrap(), 2);
        assert_eq!(log.commit("g", 0).unwrap(), 2);
        assert_eq!(log.committed("g").unwrap(), Some(2));
    }

    #[test]
    fn test_commit_out_of_range() {
        let (log, _temp_dir) = create_test_log();
        log.append(&temperature(1.0)).unwrap();

        assert!(matches!(
            log.commit("g", 5),
            Err(EventLogError::OutOfRange { position: 5, len: 1 })
        ));
    }

    #[test]
    fn test_reopen_restores_records_and_offsets() {
        let temp_dir = TempDir::new().unwrap();
        let config = EventLogConfig::new(temp_dir.path());
        {
            let log = EventLog::open(config.clone()).unwrap();
            log.append(&temperature(1.0)).unwrap();
            log.append(&traffic(2)).unwrap();
            log.commit("g", 0).unwrap();
        }

        let log = EventLog::open(config).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.committed("g").unwrap(), Some(0));
        assert_eq!(log.append(&temperature(3.0)).unwrap(), 2);
    }

    #[test]
    fn test_open_truncates_torn_tail() {
        let temp_dir = TempDir::new().unwrap();
        let config = EventLogConfig::new(temp_dir.path());
        {
            let log = EventLog::open(config.clone()).unwrap();
            log.append(&temperature(1.0)).unwrap();
        }
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(config.events_path())
                .unwrap();
            file.write_all(b"{\"type\":\"temperature_condi").unwrap();
        }

        let log = EventLog::open(config).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.append(&temperature(2.0)).unwrap(), 1);

        let read: Vec<_> = log.scan().collect::<Result<_, _>>().unwrap();
        assert_eq!(read.len(), 2);
    }

    #[test]
    fn test_cursor_waits_for_concurrent_append() {
        let temp_dir = TempDir::new().unwrap();
        let log = Arc::new(EventLog::open(EventLogConfig::new(temp_dir.path())).unwrap());

        let writer = {
            let log = log.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                log.append(&temperature(9.0)).unwrap();
            })
        };

        let mut cursor = log.read_from("g", Some(0), Duration::from_secs(5)).unwrap();
        let (position, envelope) = cursor.next().unwrap().unwrap();
        writer.join().unwrap();

        assert_eq!(position, 0);
        assert_eq!(envelope.trace_id(), "trace-9");
    }

    #[test]
    fn test_concurrent_appends_are_serialized() {
        let temp_dir = TempDir::new().unwrap();
        let log = Arc::new(EventLog::open(EventLogConfig::new(temp_dir.path())).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        log.append(&traffic(t * 100 + i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let read: Vec<_> = log.scan().collect::<Result<_, _>>().unwrap();
        assert_eq!(read.len(), 100);
        for (i, (position, _)) in read.iter().enumerate() {
            assert_eq!(*position, i as u64);
        }
    }

    #[test]
    fn test_poisoned_log_refuses_appends() {
        let (log, _temp_dir) = create_test_log();
        log.append(&temperature(1.0)).unwrap();

        // State left behind when a partial append could not be truncated
        log.state.lock().poisoned = true;

        assert!(matches!(
            log.append(&temperature(2.0)),
            Err(EventLogError::Transport(_))
        ));
        assert_eq!(log.len(), 1);

        // Reads of the indexed records still work
        let read: Vec<_> = log.scan().collect::<Result<_, _>>().unwrap();
        assert_eq!(read.len(), 1);
    }

    #[test]
    fn test_scan_ignores_appends_made_during_the_scan() {
        let (log, _temp_dir) = create_test_log();
        log.append(&temperature(1.0)).unwrap();
        log.append(&temperature(2.0)).unwrap();

        let mut cursor = log.scan();
        assert_eq!(cursor.next().unwrap().unwrap().0, 0);
        log.append(&temperature(3.0)).unwrap();
        assert_eq!(cursor.next().unwrap().unwrap().0, 1);
        assert!(cursor.next().is_none());
        assert_eq!(log.len(), 3);
    }
}
