use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub transaction: TransactionConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Store location and try budgets
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Each event directory holds at most 10^order entries
    #[serde(default = "default_sharder_order")]
    pub sharder_order: u32,
    #[serde(default = "default_append_tries")]
    pub append_tries: u64,
    #[serde(default = "default_tries")]
    pub read_tries: u64,
    #[serde(default = "default_tries")]
    pub trim_tries: u64,
    #[serde(default = "default_tries")]
    pub init_tries: u64,
    /// fsync staged files before they are published
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            sharder_order: default_sharder_order(),
            append_tries: default_append_tries(),
            read_tries: default_tries(),
            trim_tries: default_tries(),
            init_tries: default_tries(),
            sync_writes: default_sync_writes(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("data/events")
}

fn default_sharder_order() -> u32 {
    crate::sharder::DEFAULT_ORDER
}

fn default_append_tries() -> u64 {
    10_000
}

fn default_tries() -> u64 {
    1000
}

fn default_sync_writes() -> bool {
    true
}

/// Transaction protocol timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionConfig {
    /// Grace period before an open transaction may be completed by others
    #[serde(default = "default_help_after")]
    pub help_after: HumanDuration,
    #[serde(default = "default_scavenge_interval")]
    pub scavenge_interval: HumanDuration,
    /// Minimum age of abandoned staging/delete entries before reclaiming them
    #[serde(default = "default_scavenge_age")]
    pub scavenge_age: HumanDuration,
    #[serde(default = "default_batch")]
    pub scavenge_batch: usize,
    #[serde(default = "default_preserve_for")]
    pub preserve_for: HumanDuration,
    #[serde(default = "default_batch")]
    pub preserve_batch: usize,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            help_after: default_help_after(),
            scavenge_interval: default_scavenge_interval(),
            scavenge_age: default_scavenge_age(),
            scavenge_batch: default_batch(),
            preserve_for: default_preserve_for(),
            preserve_batch: default_batch(),
            backoff: BackoffConfig::default(),
        }
    }
}

fn default_help_after() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_scavenge_interval() -> HumanDuration {
    HumanDuration::from_secs(3600)
}

fn default_scavenge_age() -> HumanDuration {
    HumanDuration::from_secs(3600)
}

fn default_batch() -> usize {
    5
}

fn default_preserve_for() -> HumanDuration {
    HumanDuration::from_secs(1)
}

/// Backoff strategy between contended attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    None,
    Linear,
    Exponential,
}

impl Default for BackoffKind {
    fn default() -> Self {
        BackoffKind::Exponential
    }
}

/// Backoff configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackoffConfig {
    #[serde(default)]
    pub kind: BackoffKind,
    /// First pause (exponential) or step (linear)
    #[serde(default = "default_backoff_initial")]
    pub initial: HumanDuration,
    #[serde(default = "default_backoff_max")]
    pub max: HumanDuration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            kind: BackoffKind::default(),
            initial: default_backoff_initial(),
            max: default_backoff_max(),
        }
    }
}

fn default_backoff_initial() -> HumanDuration {
    HumanDuration::from_micros(50)
}

fn default_backoff_max() -> HumanDuration {
    HumanDuration::from_millis(2)
}

/// Event streaming
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// How often followers re-read the head; 0 disables polling
    #[serde(default = "default_polling_interval")]
    pub polling_interval: HumanDuration,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            polling_interval: default_polling_interval(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_polling_interval() -> HumanDuration {
    HumanDuration::from_secs(1)
}

fn default_batch_size() -> usize {
    crate::stream::DEFAULT_BATCH_SIZE
}

/// Logging
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// `tracing_subscriber::EnvFilter` directives, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
