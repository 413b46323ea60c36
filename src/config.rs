//! Configuration manager for the WatchList authentication service.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default relational store file, relative to the working directory.
pub const DEFAULT_DB_FILE: &str = "watchlistdb.sqlite";
const DEFAULT_SALT: &str = "watchlist-instance";

/// Instance settings read from `config.yaml`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Secret used to derive the field-encryption key. Required.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    /// Salt mixed into the key derivation. Optional, instance-wide.
    #[serde(skip_serializing)]
    pub salt: Option<String>,
    /// Path of the SQLite store file.
    pub database: Option<PathBuf>,
    /// Listening port.
    pub port: Option<u16>,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    /// Override the configuration file location.
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Arc<Self> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration =
                    match serde_yaml::from_reader(file) {
                        Ok(config) => config,
                        Err(err) => {
                            return Arc::new(self.error(err));
                        },
                    };

                // set app version.
                config.version = VERSION.to_owned();

                Arc::new(config)
            },
            Err(err) => Arc::new(self.error(err)),
        }
    }

    /// Check the properties a running instance cannot live without.
    ///
    /// The status endpoint calls this per request so a misconfigured
    /// instance reports `["ERROR", false]` instead of a login failure.
    pub fn validate(&self) -> Result<(), crate::ServerError> {
        match &self.secret {
            Some(secret) if !secret.is_empty() => Ok(()),
            _ => Err(crate::ServerError::Configuration),
        }
    }

    /// Salt for the key derivation.
    pub fn salt(&self) -> &str {
        self.salt.as_deref().unwrap_or(DEFAULT_SALT)
    }

    /// Path of the SQLite store file.
    pub fn database_file(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_secret() {
        let config = Configuration::default();
        assert!(config.validate().is_err());

        let config = Configuration {
            secret: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Configuration {
            secret: Some("hunter2".into()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.database_file(), PathBuf::from(DEFAULT_DB_FILE));
        assert_eq!(config.salt(), DEFAULT_SALT);
    }
}
