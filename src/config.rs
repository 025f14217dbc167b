//! Application-level configuration loading: event queue sizing, reconnection policy, random
//! seed and storage backend selection.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::state::event_bus::DEFAULT_QUEUE_CAPACITY;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DUO_CARDS_CONFIG_PATH";

/// Backend holding rooms, questions, history and answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Process-local tables, lost on restart.
    #[default]
    Memory,
    /// CouchDB configured through the `COUCH_*` environment variables.
    Couchdb,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Events buffered per subscription before new ones are dropped.
    pub subscriber_queue_capacity: usize,
    /// How long a paused room waits for its disconnected party.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub reconnection_timeout: Duration,
    /// Period of the background reconnection sweep.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub sweep_interval: Duration,
    /// Fixed seed for turn assignment and draws; OS entropy when absent.
    pub rng_seed: Option<u64>,
    /// Record store backend.
    pub storage: StorageKind,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        storage = ?config.storage,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; missing fields keep their default.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            subscriber_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            reconnection_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            rng_seed: None,
            storage: StorageKind::Memory,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        assert_eq!(AppConfig::from_json("{}").unwrap(), AppConfig::default());
    }

    #[test]
    fn durations_are_read_in_seconds() {
        let config = AppConfig::from_json(
            r#"{
                "subscriber_queue_capacity": 8,
                "reconnection_timeout": 90,
                "sweep_interval": 5,
                "rng_seed": 42,
                "storage": "couchdb"
            }"#,
        )
        .unwrap();

        assert_eq!(config.subscriber_queue_capacity, 8);
        assert_eq!(config.reconnection_timeout, Duration::from_secs(90));
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.storage, StorageKind::Couchdb);
    }

    #[test]
    fn unknown_storage_is_an_error() {
        assert!(AppConfig::from_json(r#"{"storage": "mongodb"}"#).is_err());
    }
}
