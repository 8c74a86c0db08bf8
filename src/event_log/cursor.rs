//! Lazy, restartable reads over the event log

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::time::Duration;

use crate::types::Envelope;

use super::store::{EventLog, EventLogError, EventLogResult};

/// Iterator over `(position, envelope)` pairs starting at a fixed position
///
/// Each call to `next` waits at most `idle_timeout` for the next record to
/// be appended. The cursor ends the first time that wait expires, at its
/// end position if it has one, or after an I/O failure (which is yielded
/// once as an error).
///
/// A record that fails to decode is yielded as [`EventLogError::Corrupt`]
/// and the cursor moves past it.
pub struct LogCursor<'a> {
    log: &'a EventLog,
    next_position: u64,
    idle_timeout: Duration,
    /// First position not to read
    end: Option<u64>,
    reader: Option<BufReader<File>>,
    /// Byte offset the reader is positioned at
    reader_offset: u64,
    /// Indexed length of the log when the reader last filled its buffer;
    /// buffered bytes past it may belong to a rolled-back append
    reader_durable_end: u64,
    line: String,
    done: bool,
}

impl<'a> LogCursor<'a> {
    pub(crate) fn new(log: &'a EventLog, start: u64, idle_timeout: Duration) -> Self {
        Self {
            log,
            next_position: start,
            idle_timeout,
            end: None,
            reader: None,
            reader_offset: 0,
            reader_durable_end: 0,
            line: String::new(),
            done: false,
        }
    }

    /// Cursor over `[start, end)` that never waits for new appends
    pub(crate) fn bounded(log: &'a EventLog, start: u64, end: u64) -> Self {
        Self {
            end: Some(end),
            ..Self::new(log, start, Duration::ZERO)
        }
    }

    /// Position the next call to `next` will read
    pub fn position(&self) -> u64 {
        self.next_position
    }

    fn read_record(&mut self, offset: u64) -> EventLogResult<Envelope> {
        let durable_end = self.log.indexed_end();
        let mut reader = match self.reader.take() {
            Some(reader)
                if self.reader_offset == offset
                    && offset + reader.buffer().len() as u64 <= self.reader_durable_end =>
            {
                reader
            }
            _ => {
                let mut file = File::open(self.log.config().events_path())?;
                file.seek(SeekFrom::Start(offset))?;
                BufReader::new(file)
            }
        };

        self.line.clear();
        let read = reader.read_line(&mut self.line)?;
        self.reader_offset = offset + read as u64;
        self.reader_durable_end = durable_end;
        self.reader = Some(reader);

        let position = self.next_position;
        if read == 0 {
            return Err(EventLogError::Corrupt {
                position,
                reason: "record missing from log file".to_string(),
            });
        }

        Envelope::from_json_line(self.line.trim_end()).map_err(|e| EventLogError::Corrupt {
            position,
            reason: e.to_string(),
        })
    }
}

impl Iterator for LogCursor<'_> {
    type Item = EventLogResult<(u64, Envelope)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.end.is_some_and(|end| self.next_position >= end) {
            self.done = true;
            return None;
        }

        let Some(offset) = self.log.wait_for_record(self.next_position, self.idle_timeout) else {
            self.done = true;
            return None;
        };

        let position = self.next_position;
        match self.read_record(offset) {
            Ok(envelope) => {
                self.next_position += 1;
                Some(Ok((position, envelope)))
            }
            Err(e @ EventLogError::Corrupt { .. }) => {
                self.next_position += 1;
                Some(Err(e))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::EventLogConfig;
    use crate::types::{Reading, TrafficReading};
    use chrono::Utc;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn traffic(density: i64) -> Envelope {
        Envelope::new(Reading::Traffic(TrafficReading {
            event_id: format!("evt-{}", density),
            sensor_id: "s".to_string(),
            traffic_density: density,
            timestamp: Utc::now(),
            incident_report: None,
            trace_id: format!("t-{}", density),
        }))
    }

    #[test]
    fn test_cursor_skips_corrupt_record() {
        let temp_dir = TempDir::new().unwrap();
        let config = EventLogConfig::new(temp_dir.path());
        {
            let log = EventLog::open(config.clone()).unwrap();
            log.append(&traffic(1)).unwrap();
        }
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(config.events_path())
                .unwrap();
            writeln!(file, "{{\"not\":\"an envelope\"}}").unwrap();
        }
        let log = EventLog::open(config).unwrap();
        log.append(&traffic(3)).unwrap();

        let results: Vec<_> = log.scan().collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(EventLogError::Corrupt { position: 1, .. })
        ));
        assert_eq!(results[2].as_ref().unwrap().0, 2);
    }

    #[test]
    fn test_cursor_position_tracks_progress() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::open(EventLogConfig::new(temp_dir.path())).unwrap();
        log.append(&traffic(1)).unwrap();
        log.append(&traffic(2)).unwrap();

        let mut cursor = log.read_from("g", Some(1), Duration::ZERO).unwrap();
        assert_eq!(cursor.position(), 1);
        cursor.next().unwrap().unwrap();
        assert_eq!(cursor.position(), 2);
        assert!(cursor.next().is_none());
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_cursor_rereads_after_rolled_back_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let config = EventLogConfig::new(temp_dir.path());
        let log = EventLog::open(config.clone()).unwrap();
        log.append(&traffic(1)).unwrap();
        let durable_len = std::fs::metadata(config.events_path()).unwrap().len();

        // Bytes of an append that will fail, visible to the first read
        let partial = b"{\"type\":\"traffic_condition\",\"payload\":{\"eventID\"";
        OpenOptions::new()
            .append(true)
            .open(config.events_path())
            .unwrap()
            .write_all(partial)
            .unwrap();

        let mut cursor = log.read_from("g", Some(0), Duration::ZERO).unwrap();
        assert_eq!(cursor.next().unwrap().unwrap().0, 0);

        // Roll the partial bytes back and write a real record in their place
        OpenOptions::new()
            .write(true)
            .open(config.events_path())
            .unwrap()
            .set_len(durable_len)
            .unwrap();
        log.append(&traffic(2)).unwrap();

        let (position, envelope) = cursor.next().unwrap().unwrap();
        assert_eq!(position, 1);
        assert_eq!(envelope.trace_id(), "t-2");
    }
}
