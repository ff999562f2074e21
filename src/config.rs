//! Environment-based configuration for the grant store and its admin tooling.

use anyhow::Result;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::oauth::clients::registry::DEFAULT_SECRET_MIN_LENGTH;

/// Interval between expired-artifact purge sweeps
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurgeInterval(Duration);

/// Minimum cleartext client secret length accepted by the registry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretMinLength(usize);

/// Main application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub version: String,
    pub storage_backend: String,
    pub database_url: Option<String>,
    pub purge_interval: PurgeInterval,
    pub secret_min_length: SecretMinLength,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let storage_backend = default_env("STORAGE_BACKEND", "memory");
        let database_url = match storage_backend.as_str() {
            "postgres" => Some(require_env("DATABASE_URL")?),
            _ => optional_env("DATABASE_URL"),
        };
        let purge_interval: PurgeInterval = default_env("PURGE_INTERVAL", "5m").try_into()?;
        let secret_min_length: SecretMinLength = optional_env("SECRET_MIN_LENGTH").try_into()?;

        Ok(Self {
            version: version()?,
            storage_backend,
            database_url,
            purge_interval,
            secret_min_length,
        })
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired(name.to_string()).into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn default_env(name: &str, default_value: &str) -> String {
    optional_env(name).unwrap_or_else(|| default_value.to_string())
}

impl TryFrom<String> for PurgeInterval {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value.clone(), e.to_string()))?;
        if duration.is_zero() {
            return Err(ConfigError::DurationParsingFailed(
                value,
                "interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self(duration))
    }
}

impl AsRef<Duration> for PurgeInterval {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<Option<String>> for SecretMinLength {
    type Error = ConfigError;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        match value {
            None => Ok(Self(DEFAULT_SECRET_MIN_LENGTH)),
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map(Self)
                .map_err(|err| ConfigError::NumberParsingFailed(value, err)),
        }
    }
}

impl AsRef<usize> for SecretMinLength {
    fn as_ref(&self) -> &usize {
        &self.0
    }
}
