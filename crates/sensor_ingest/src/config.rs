use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which device state store adapter to run with
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map, lost on exit
    Memory,
    /// One JSON document per device under `store_dir`
    File,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    // Store configuration
    #[serde(default = "default_store_backend")]
    pub store_backend: StoreBackend,

    /// Directory for the file backend
    #[serde(default = "default_store_dir")]
    pub store_dir: String,

    // Input configuration
    /// Newline-delimited JSON transport messages; "-" reads stdin
    #[serde(default = "default_input_path")]
    pub input_path: String,

    /// Batch size for the envelope source
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Max wait after the first message of a batch, in milliseconds
    #[serde(default = "default_batch_wait_ms")]
    pub batch_wait_ms: u64,

    /// Transport system property carrying the device id
    #[serde(default = "default_device_id_property")]
    pub device_id_property: String,

    /// Time allowed for closing the store on shutdown, in seconds
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "sensor-ingest".to_string()
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_store_dir() -> String {
    "./data/devices".to_string()
}

fn default_input_path() -> String {
    "-".to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_batch_wait_ms() -> u64 {
    500
}

fn default_device_id_property() -> String {
    ingestion_worker::DEFAULT_DEVICE_ID_PROPERTY.to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    /// Load configuration from environment variables prefixed with `SENSOR_INGEST_`
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("SENSOR_INGEST"))
            .build()?
            .try_deserialize()
    }

    pub fn batch_wait(&self) -> Duration {
        Duration::from_millis(self.batch_wait_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn reads_stdin(&self) -> bool {
        self.input_path == "-"
    }
}
