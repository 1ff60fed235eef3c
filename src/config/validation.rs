use super::models::{BackoffKind, Config};
use crate::sharder::MAX_ORDER;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Store root must not be empty")]
    EmptyRoot,

    #[error("Sharder order must be between 1 and {max}, got {order}")]
    InvalidSharderOrder { order: u32, max: u32 },

    #[error("Try budget must be positive: {field}")]
    ZeroTries { field: String },

    #[error("Batch size must be positive: {field}")]
    ZeroBatch { field: String },

    #[error("Scavenge age ({scavenge_age}) must not be shorter than help_after ({help_after})")]
    ScavengeBeforeHelp {
        scavenge_age: String,
        help_after: String,
    },

    #[error("Backoff initial ({initial}) exceeds max ({max})")]
    InvalidBackoff { initial: String, max: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_store(config)?;
    validate_transaction(config)?;
    validate_stream(config)?;
    Ok(())
}

fn validate_store(config: &Config) -> Result<(), ValidationError> {
    let store = &config.store;
    if store.root.as_os_str().is_empty() {
        return Err(ValidationError::EmptyRoot);
    }
    if !(1..=MAX_ORDER).contains(&store.sharder_order) {
        return Err(ValidationError::InvalidSharderOrder {
            order: store.sharder_order,
            max: MAX_ORDER,
        });
    }
    for (field, tries) in [
        ("store.append_tries", store.append_tries),
        ("store.read_tries", store.read_tries),
        ("store.trim_tries", store.trim_tries),
        ("store.init_tries", store.init_tries),
    ] {
        if tries == 0 {
            return Err(ValidationError::ZeroTries {
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

/// Scavenging staging dirs younger than the help grace period could pull a
/// slow writer's staged transaction out from under it.
fn validate_transaction(config: &Config) -> Result<(), ValidationError> {
    let txn = &config.transaction;
    if txn.scavenge_age < txn.help_after {
        return Err(ValidationError::ScavengeBeforeHelp {
            scavenge_age: txn.scavenge_age.to_string(),
            help_after: txn.help_after.to_string(),
        });
    }
    for (field, batch) in [
        ("transaction.scavenge_batch", txn.scavenge_batch),
        ("transaction.preserve_batch", txn.preserve_batch),
    ] {
        if batch == 0 {
            return Err(ValidationError::ZeroBatch {
                field: field.to_string(),
            });
        }
    }
    let backoff = &txn.backoff;
    if backoff.kind != BackoffKind::None && backoff.initial > backoff.max {
        return Err(ValidationError::InvalidBackoff {
            initial: backoff.initial.to_string(),
            max: backoff.max.to_string(),
        });
    }
    Ok(())
}

fn validate_stream(config: &Config) -> Result<(), ValidationError> {
    if config.stream.batch_size == 0 {
        return Err(ValidationError::ZeroBatch {
            field: "stream.batch_size".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::HumanDuration;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_invalid_sharder_order() {
        let mut config = Config::default();
        config.store.sharder_order = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidSharderOrder { order: 0, .. })
        ));
    }

    #[test]
    fn test_zero_tries() {
        let mut config = Config::default();
        config.store.trim_tries = 0;
        let err = validate(&config).unwrap_err();
        assert_eq!(err.to_string(), "Try budget must be positive: store.trim_tries");
    }

    #[test]
    fn test_scavenge_age_below_help_after() {
        let mut config = Config::default();
        config.transaction.scavenge_age = HumanDuration::from_secs(5);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ScavengeBeforeHelp { .. })
        ));
    }

    #[test]
    fn test_backoff_bounds() {
        let mut config = Config::default();
        config.transaction.backoff.initial = HumanDuration::from_secs(1);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidBackoff { .. })
        ));

        config.transaction.backoff.kind = BackoffKind::None;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_stream_batch() {
        let mut config = Config::default();
        config.stream.batch_size = 0;
        assert!(matches!(validate(&config), Err(ValidationError::ZeroBatch { .. })));
    }
}
