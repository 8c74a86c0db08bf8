//! Service configuration
//!
//! Values come from an optional file named by `APP_CONF_FILE` and are
//! overridden by `SENSOR_PIPELINE_*` environment variables. Every field has a
//! default, so an empty environment yields a runnable configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::aggregator::AggregatorConfig;
use crate::consumer::ConsumerConfig;
use crate::event_log::EventLogConfig;
use crate::storage::StoreConfig;

/// Environment variable naming an optional configuration file
pub const CONF_FILE_VAR: &str = "APP_CONF_FILE";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "SENSOR_PIPELINE";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Service identity, also the log file name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for `<service_name>.log`
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Emit JSON lines on stdout instead of human-readable text
    #[serde(default)]
    pub log_json: bool,

    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Root directory for the log, offsets, tables and summary
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Consumer group the persisting consumer commits under
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,

    #[serde(default = "default_consumer_poll_timeout_ms")]
    pub consumer_poll_timeout_ms: u64,

    #[serde(default = "default_consumer_retry_delay_ms")]
    pub consumer_retry_delay_ms: u64,

    #[serde(default = "default_consumer_batch_size")]
    pub consumer_batch_size: usize,

    #[serde(default = "default_aggregation_interval_secs")]
    pub aggregation_interval_secs: u64,

    /// Ignore re-inserts of an already stored `trace_id`
    #[serde(default)]
    pub unique_trace_id: bool,

    /// Allow any origin on the HTTP surface
    #[serde(default)]
    pub cors_allow_all: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            log_json: false,
            listen_addr: default_listen_addr(),
            data_dir: default_data_dir(),
            consumer_group: default_consumer_group(),
            consumer_poll_timeout_ms: default_consumer_poll_timeout_ms(),
            consumer_retry_delay_ms: default_consumer_retry_delay_ms(),
            consumer_batch_size: default_consumer_batch_size(),
            aggregation_interval_secs: default_aggregation_interval_secs(),
            unique_trace_id: false,
            cors_allow_all: false,
        }
    }
}

impl AppConfig {
    /// Load from `APP_CONF_FILE` (if set) and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var_os(CONF_FILE_VAR).map(PathBuf::from);
        Self::from_sources(file.as_deref(), Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from an optional file, then apply `env` on top
    pub fn from_sources(file: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder.add_source(env).build()?.try_deserialize()
    }

    pub fn event_log_config(&self) -> EventLogConfig {
        EventLogConfig::new(&self.data_dir)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.data_dir).with_unique_trace_id(self.unique_trace_id)
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            group: self.consumer_group.clone(),
            poll_timeout: Duration::from_millis(self.consumer_poll_timeout_ms),
            retry_delay: Duration::from_millis(self.consumer_retry_delay_ms),
            batch_size: self.consumer_batch_size.max(1),
        }
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            interval: Duration::from_secs(self.aggregation_interval_secs.max(1)),
        }
    }
}

fn default_service_name() -> String {
    "sensor-pipeline".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_consumer_group() -> String {
    "event_group".to_string()
}

fn default_consumer_poll_timeout_ms() -> u64 {
    500
}

fn default_consumer_retry_delay_ms() -> u64 {
    1000
}

fn default_consumer_batch_size() -> usize {
    100
}

fn default_aggregation_interval_secs() -> u64 {
    5
}
