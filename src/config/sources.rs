use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "FSSTORE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/fsstore.toml";
const ENV_PREFIX: &str = "FSSTORE";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // FSSTORE__STORE__ROOT -> store.root
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackoffKind;
    use crate::humanize::HumanDuration;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.store.root, PathBuf::from("data/events"));
        assert_eq!(config.store.sharder_order, 3);
        assert_eq!(config.transaction.help_after, HumanDuration::from_secs(10));
        assert_eq!(config.stream.batch_size, 32);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[store]
root = "/mnt/shared/events"
sharder_order = 2
sync_writes = false

[transaction]
help_after = "30s"
scavenge_age = "2h"

[transaction.backoff]
kind = "linear"
initial = "100us"
max = "5ms"

[stream]
polling_interval = "250ms"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.store.root, PathBuf::from("/mnt/shared/events"));
        assert_eq!(config.store.sharder_order, 2);
        assert!(!config.store.sync_writes);
        assert_eq!(config.store.append_tries, 10_000);
        assert_eq!(config.transaction.help_after, HumanDuration::from_secs(30));
        assert_eq!(config.transaction.scavenge_age, HumanDuration::from_secs(7200));
        assert_eq!(config.transaction.backoff.kind, BackoffKind::Linear);
        assert_eq!(config.transaction.backoff.max, HumanDuration::from_millis(5));
        assert_eq!(config.stream.polling_interval, HumanDuration::from_millis(250));
    }

    // Environment overrides mutate process state; covered by running the binary
}
