//! Configuration validation.
//!
//! Checks every setting the binary reads before any connection is opened.

use std::fmt;

use crate::domain::error::LedgerError;
use crate::domain::ledger::SellPolicy;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_SQLITE_PATH: &str = "stockledger.db";
pub const DEFAULT_POOL_SIZE: i64 = 4;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Postgres,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Sqlite => f.write_str("sqlite"),
            StoreBackend::Postgres => f.write_str("postgres"),
        }
    }
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    let backend = store_backend(config)?;
    validate_pool_size(config, backend)?;
    if backend == StoreBackend::Postgres {
        config.require_string("postgres", "connection_string")?;
    }
    sell_policy(config)?;
    validate_log_level(config)?;
    Ok(())
}

pub fn store_backend(config: &dyn ConfigPort) -> Result<StoreBackend, LedgerError> {
    match config.get_string("database", "backend") {
        None => Ok(StoreBackend::Sqlite),
        Some(value) => match value.trim().to_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            _ => Err(LedgerError::ConfigInvalid {
                section: "database".to_string(),
                key: "backend".to_string(),
                reason: format!("expected sqlite or postgres, got {value:?}"),
            }),
        },
    }
}

pub fn sell_policy(config: &dyn ConfigPort) -> Result<SellPolicy, LedgerError> {
    match config.get_string("ledger", "sell_policy") {
        None => Ok(SellPolicy::default()),
        Some(value) => value
            .parse()
            .map_err(|reason| LedgerError::ConfigInvalid {
                section: "ledger".to_string(),
                key: "sell_policy".to_string(),
                reason,
            }),
    }
}

/// Pool size for the section of the active backend.
pub fn pool_size(config: &dyn ConfigPort, section: &str) -> u32 {
    config
        .get_int(section, "pool_size", DEFAULT_POOL_SIZE)
        .clamp(1, u32::MAX as i64) as u32
}

fn validate_pool_size(config: &dyn ConfigPort, backend: StoreBackend) -> Result<(), LedgerError> {
    let section = backend.to_string();
    let value = config.get_int(&section, "pool_size", DEFAULT_POOL_SIZE);
    if value < 1 {
        return Err(LedgerError::ConfigInvalid {
            section,
            key: "pool_size".to_string(),
            reason: "pool_size must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_log_level(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    if let Some(level) = config.get_string("logging", "level") {
        if !LOG_LEVELS.contains(&level.trim().to_lowercase().as_str()) {
            return Err(LedgerError::ConfigInvalid {
                section: "logging".to_string(),
                key: "level".to_string(),
                reason: format!("expected one of {}", LOG_LEVELS.join(", ")),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig {
        values: HashMap<(String, String), String>,
    }

    impl MapConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            let values = entries
                .iter()
                .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                .collect();
            Self { values }
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.values
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }
        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
    }

    #[test]
    fn empty_config_is_valid() {
        let config = MapConfig::new(&[]);
        validate_config(&config).unwrap();
        assert_eq!(store_backend(&config).unwrap(), StoreBackend::Sqlite);
        assert_eq!(sell_policy(&config).unwrap(), SellPolicy::Reject);
        assert_eq!(pool_size(&config, "sqlite"), 4);
    }

    #[test]
    fn unknown_backend_rejected() {
        let config = MapConfig::new(&[("database", "backend", "mysql")]);
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigInvalid { key, .. } if key == "backend"));
    }

    #[test]
    fn postgres_requires_connection_string() {
        let config = MapConfig::new(&[("database", "backend", "postgres")]);
        let err = validate_config(&config).unwrap_err();
        assert!(
            matches!(err, LedgerError::ConfigMissing { section, key } if section == "postgres" && key == "connection_string")
        );
    }

    #[test]
    fn postgres_with_connection_string_is_valid() {
        let config = MapConfig::new(&[
            ("database", "backend", "PostgreSQL"),
            ("postgres", "connection_string", "host=localhost"),
        ]);
        validate_config(&config).unwrap();
    }

    #[test]
    fn zero_pool_size_rejected() {
        let config = MapConfig::new(&[("sqlite", "pool_size", "0")]);
        let err = validate_config(&config).unwrap_err();
        assert!(
            matches!(err, LedgerError::ConfigInvalid { section, key, .. } if section == "sqlite" && key == "pool_size")
        );
    }

    #[test]
    fn sell_policy_read_from_ledger_section() {
        let config = MapConfig::new(&[("ledger", "sell_policy", "clamp")]);
        assert_eq!(sell_policy(&config).unwrap(), SellPolicy::Clamp);
    }

    #[test]
    fn bad_sell_policy_rejected() {
        let config = MapConfig::new(&[("ledger", "sell_policy", "fifo")]);
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigInvalid { key, .. } if key == "sell_policy"));
    }

    #[test]
    fn bad_log_level_rejected() {
        let config = MapConfig::new(&[("logging", "level", "loud")]);
        assert!(validate_config(&config).is_err());
        let config = MapConfig::new(&[("logging", "level", "DEBUG")]);
        assert!(validate_config(&config).is_ok());
    }
}
