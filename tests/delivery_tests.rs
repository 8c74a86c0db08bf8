//! Log delivery and recovery tests
//!
//! - Replay order per type under interleaved appends
//! - Concurrent producers and a live consumer
//! - Restart from committed offsets after reopening everything
//! - Torn final record after a crash mid-append

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;

use sensor_pipeline::storage::RowIndex;
use sensor_pipeline::types::{TemperatureReading, TrafficReading};
use sensor_pipeline::{
    CommittingConsumer, ConsumerConfig, EventLog, EventLogConfig, EventType, JsonlReadingStore,
    Producer, Reading, ReadingStore, ReplayReader, StoreConfig,
};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_data_dir() -> std::path::PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    std::path::PathBuf::from(format!(
        "target/test_delivery_{}_{}",
        std::process::id(),
        id
    ))
}

fn cleanup_dir(path: &std::path::Path) {
    let _ = fs::remove_dir_all(path);
}

fn temperature(sensor: &str, value: f64) -> TemperatureReading {
    TemperatureReading {
        event_id: format!("evt-{}", sensor),
        sensor_id: sensor.to_string(),
        temperature: value,
        timestamp: Utc::now(),
        city_zone: None,
        trace_id: String::new(),
    }
}

fn traffic(sensor: &str, density: i64) -> TrafficReading {
    TrafficReading {
        event_id: format!("evt-{}", sensor),
        sensor_id: sensor.to_string(),
        traffic_density: density,
        timestamp: Utc::now(),
        incident_report: None,
        trace_id: String::new(),
    }
}

fn consumer_config() -> ConsumerConfig {
    ConsumerConfig {
        poll_timeout: Duration::ZERO,
        retry_delay: Duration::ZERO,
        ..ConsumerConfig::new("event_group")
    }
}

#[test]
fn test_nth_of_type_follows_append_order_per_type() {
    let data_dir = test_data_dir();
    let log = Arc::new(EventLog::open(EventLogConfig::new(&data_dir)).unwrap());
    let producer = Producer::new(log.clone());

    // Interleave: T0 X0 X1 T1 T2 X2
    producer.submit(temperature("t0", 0.0)).unwrap();
    producer.submit(traffic("x0", 0)).unwrap();
    producer.submit(traffic("x1", 1)).unwrap();
    producer.submit(temperature("t1", 1.0)).unwrap();
    producer.submit(temperature("t2", 2.0)).unwrap();
    producer.submit(traffic("x2", 2)).unwrap();

    let replay = ReplayReader::new(log);
    for k in 0..3u64 {
        match replay.nth_of_type(EventType::Temperature, k).unwrap() {
            Some(Reading::Temperature(r)) => assert_eq!(r.sensor_id, format!("t{}", k)),
            other => panic!("unexpected temperature at {}: {:?}", k, other),
        }
        match replay.nth_of_type(EventType::Traffic, k).unwrap() {
            Some(Reading::Traffic(r)) => assert_eq!(r.traffic_density, k as i64),
            other => panic!("unexpected traffic at {}: {:?}", k, other),
        }
    }
    assert!(replay.nth_of_type(EventType::Temperature, 3).unwrap().is_none());

    let stats = replay.stats().unwrap();
    assert_eq!(stats.num_temperature, 3);
    assert_eq!(stats.num_traffic, 3);

    cleanup_dir(&data_dir);
}

#[test]
fn test_concurrent_producers_are_all_persisted() {
    let data_dir = test_data_dir();
    let log = Arc::new(EventLog::open(EventLogConfig::new(&data_dir)).unwrap());
    let store = Arc::new(JsonlReadingStore::open(StoreConfig::new(&data_dir)).unwrap());

    let mut consumer = CommittingConsumer::new(log.clone(), store.clone(), consumer_config());
    consumer.poll_once().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let producer = Producer::new(log.clone());
            thread::spawn(move || {
                for i in 0..25 {
                    producer
                        .submit(temperature(&format!("w{}-{}", worker, i), i as f64))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut persisted = 0;
    while persisted < 100 {
        let report = consumer.poll_once().unwrap();
        assert!(!report.is_empty(), "consumer stalled at {}", persisted);
        persisted += report.persisted;
    }

    assert_eq!(store.row_counts(), (100, 0));
    assert_eq!(log.committed("event_group").unwrap(), Some(99));

    // Each worker's readings were sequenced in submission order
    let rows = store
        .temperature_between(
            Utc::now() - chrono::Duration::minutes(1),
            Utc::now() + chrono::Duration::minutes(1),
        )
        .unwrap();
    assert_eq!(rows.len(), 100);
    for worker in 0..4 {
        let prefix = format!("w{}-", worker);
        let values: Vec<f64> = rows
            .iter()
            .filter(|r| r.sensor_id.starts_with(&prefix))
            .map(|r| r.temperature)
            .collect();
        let expected: Vec<f64> = (0..25).map(|i| i as f64).collect();
        assert_eq!(values, expected);
    }

    cleanup_dir(&data_dir);
}

#[test]
fn test_restart_resumes_from_committed_offset() {
    let data_dir = test_data_dir();
    {
        let log = Arc::new(EventLog::open(EventLogConfig::new(&data_dir)).unwrap());
        let store = Arc::new(JsonlReadingStore::open(StoreConfig::new(&data_dir)).unwrap());
        let producer = Producer::new(log.clone());

        let mut consumer = CommittingConsumer::new(log.clone(), store.clone(), consumer_config());
        consumer.poll_once().unwrap();
        producer.submit(temperature("before", 1.0)).unwrap();
        consumer.poll_once().unwrap();

        // Appended while the consumer is down
        producer.submit(temperature("during", 2.0)).unwrap();
    }

    let log = Arc::new(EventLog::open(EventLogConfig::new(&data_dir)).unwrap());
    let store = Arc::new(JsonlReadingStore::open(StoreConfig::new(&data_dir)).unwrap());
    assert_eq!(log.len(), 2);
    assert_eq!(log.committed("event_group").unwrap(), Some(0));

    let mut consumer = CommittingConsumer::new(log.clone(), store.clone(), consumer_config());
    let report = consumer.poll_once().unwrap();

    assert_eq!(report.persisted, 1);
    assert_eq!(store.temperature_by(RowIndex::SensorId, "before").unwrap().len(), 1);
    assert_eq!(store.temperature_by(RowIndex::SensorId, "during").unwrap().len(), 1);

    cleanup_dir(&data_dir);
}

#[test]
fn test_torn_tail_is_dropped_on_reopen() {
    let data_dir = test_data_dir();
    let config = EventLogConfig::new(&data_dir);
    {
        let log = Arc::new(EventLog::open(config.clone()).unwrap());
        Producer::new(log).submit(traffic("cam-1", 9)).unwrap();
    }

    // Crash mid-append: half a record without its newline
    let mut file = OpenOptions::new()
        .append(true)
        .open(config.events_path())
        .unwrap();
    file.write_all(b"{\"type\":\"traffic_condition\",\"payl").unwrap();
    drop(file);

    let log = Arc::new(EventLog::open(config).unwrap());
    assert_eq!(log.len(), 1);

    let position = Producer::new(log.clone())
        .submit(traffic("cam-2", 3))
        .unwrap()
        .position;
    assert_eq!(position, 1);

    let replay = ReplayReader::new(log);
    assert_eq!(replay.stats().unwrap().num_traffic, 2);

    cleanup_dir(&data_dir);
}
