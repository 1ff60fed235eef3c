//! Configuration management for fsstore
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use fsstore::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Store root: {}", config.store.root.display());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `FSSTORE__<section>__<key>`
//!
//! Examples:
//! - `FSSTORE__STORE__ROOT=/mnt/shared/events`
//! - `FSSTORE__TRANSACTION__HELP_AFTER=30s`
//! - `FSSTORE__STREAM__POLLING_INTERVAL=0`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/fsstore.toml`.
//! This can be overridden using the `FSSTORE_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

// Re-export public types
pub use crate::humanize::HumanDuration;
pub use models::{
    BackoffConfig, BackoffKind, Config, StoreConfig, StreamConfig, TelemetryConfig,
    TransactionConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

use crate::fs::TxnOptions;
use crate::retry::Backoff;
use crate::store::StoreOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`FSSTORE__*`)
    /// 2. TOML file (default: `config/fsstore.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (zero budgets, out of range sharder order, etc.)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Backoff schedule for contended transactions
    pub fn backoff(&self) -> Backoff {
        let backoff = &self.transaction.backoff;
        match backoff.kind {
            BackoffKind::None => Backoff::None,
            BackoffKind::Linear => Backoff::Linear {
                step: backoff.initial.into(),
                max: backoff.max.into(),
            },
            BackoffKind::Exponential => Backoff::Exponential {
                initial: backoff.initial.into(),
                max: backoff.max.into(),
            },
        }
    }

    /// Options for opening the configured store
    pub fn store_options(&self) -> StoreOptions {
        let store = &self.store;
        let txn = &self.transaction;
        StoreOptions {
            sharder_order: store.sharder_order,
            append_tries: store.append_tries,
            read_tries: store.read_tries,
            trim_tries: store.trim_tries,
            init_tries: store.init_tries,
            txn: TxnOptions {
                help_after: txn.help_after.into(),
                scavenge_interval: txn.scavenge_interval.into(),
                scavenge_age: txn.scavenge_age.into(),
                scavenge_batch: txn.scavenge_batch,
                preserve_for: txn.preserve_for.into(),
                preserve_batch: txn.preserve_batch,
                sync_writes: store.sync_writes,
                backoff: self.backoff(),
            },
        }
    }
}
