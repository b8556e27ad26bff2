//! Runtime configuration read from the function's environment.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::lifecycle::{DispatcherSettings, RetryPolicy};

pub const LOG_FORMAT_VAR: &str = "CR_LOG_FORMAT";
pub const LOG_LEVEL_VAR: &str = "CR_LOG_LEVEL";
pub const POLL_INTERVAL_VAR: &str = "CR_POLL_INTERVAL_MINUTES";
pub const TIMEOUT_MARGIN_VAR: &str = "CR_TIMEOUT_MARGIN_SECONDS";
pub const DELIVERY_MAX_ATTEMPTS_VAR: &str = "CR_DELIVERY_MAX_ATTEMPTS";
pub const DELIVERY_BACKOFF_VAR: &str = "CR_DELIVERY_BACKOFF_MS";
pub const CALLBACK_TIMEOUT_VAR: &str = "CR_CALLBACK_TIMEOUT_SECONDS";

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" | "structured" => Ok(Self::Json),
            other => Err(format!("expected text or json, got {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LambdaConfig {
    pub log_format: LogFormat,
    pub log_level: String,
    pub poll_interval_minutes: u32,
    pub timeout_margin: Duration,
    pub retry: RetryPolicy,
    pub callback_timeout: Duration,
}

impl Default for LambdaConfig {
    fn default() -> Self {
        let settings = DispatcherSettings::default();
        Self {
            log_format: LogFormat::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            poll_interval_minutes: settings.poll_interval_minutes,
            timeout_margin: settings.timeout_margin,
            retry: RetryPolicy::default(),
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }
}

impl LambdaConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let log_format = match get(LOG_FORMAT_VAR) {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|reason| invalid(LOG_FORMAT_VAR, &raw, reason))?,
            None => defaults.log_format,
        };

        let log_level = get(LOG_LEVEL_VAR)
            .or_else(|| get("RUST_LOG"))
            .unwrap_or(defaults.log_level);

        let poll_interval_minutes = match get(POLL_INTERVAL_VAR) {
            Some(raw) => parse_at_least_one(POLL_INTERVAL_VAR, &raw)?,
            None => defaults.poll_interval_minutes,
        };

        let timeout_margin = match get(TIMEOUT_MARGIN_VAR) {
            Some(raw) => parse_seconds(TIMEOUT_MARGIN_VAR, &raw)?,
            None => defaults.timeout_margin,
        };

        let max_attempts = match get(DELIVERY_MAX_ATTEMPTS_VAR) {
            Some(raw) => parse_at_least_one(DELIVERY_MAX_ATTEMPTS_VAR, &raw)?,
            None => defaults.retry.max_attempts,
        };

        let initial_backoff = match get(DELIVERY_BACKOFF_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|error| invalid(DELIVERY_BACKOFF_VAR, &raw, error.to_string()))?,
            None => defaults.retry.initial_backoff,
        };

        let callback_timeout = match get(CALLBACK_TIMEOUT_VAR) {
            Some(raw) => {
                let timeout = parse_seconds(CALLBACK_TIMEOUT_VAR, &raw)?;
                if timeout.is_zero() {
                    return Err(invalid(CALLBACK_TIMEOUT_VAR, &raw, "must be positive"));
                }
                timeout
            }
            None => defaults.callback_timeout,
        };

        Ok(Self {
            log_format,
            log_level,
            poll_interval_minutes,
            timeout_margin,
            retry: RetryPolicy {
                max_attempts,
                initial_backoff,
            },
            callback_timeout,
        })
    }

    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            poll_interval_minutes: self.poll_interval_minutes,
            timeout_margin: self.timeout_margin,
        }
    }
}

fn parse_seconds(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let seconds = raw
        .trim()
        .parse::<f64>()
        .map_err(|error| invalid(key, raw, error.to_string()))?;
    Duration::try_from_secs_f64(seconds).map_err(|error| invalid(key, raw, error.to_string()))
}

fn parse_at_least_one(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(invalid(key, raw, "must be at least 1")),
        Ok(value) => Ok(value),
        Err(error) => Err(invalid(key, raw, error.to_string())),
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<LambdaConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        LambdaConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = config_from(&[]).expect("defaults should load");
        assert_eq!(config, LambdaConfig::default());
        assert_eq!(config.poll_interval_minutes, 2);
        assert_eq!(config.timeout_margin, Duration::from_secs(2));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn reads_every_override() {
        let config = config_from(&[
            (LOG_FORMAT_VAR, "structured"),
            (LOG_LEVEL_VAR, "debug"),
            (POLL_INTERVAL_VAR, "5"),
            (TIMEOUT_MARGIN_VAR, "1.5"),
            (DELIVERY_MAX_ATTEMPTS_VAR, "4"),
            (DELIVERY_BACKOFF_VAR, "250"),
            (CALLBACK_TIMEOUT_VAR, "3"),
        ])
        .expect("overrides should load");

        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.poll_interval_minutes, 5);
        assert_eq!(config.timeout_margin, Duration::from_millis(1500));
        assert_eq!(
            config.retry,
            RetryPolicy {
                max_attempts: 4,
                initial_backoff: Duration::from_millis(250),
            }
        );
        assert_eq!(config.callback_timeout, Duration::from_secs(3));
    }

    #[test]
    fn log_level_falls_back_to_rust_log() {
        let config = config_from(&[("RUST_LOG", "warn")]).expect("config should load");
        assert_eq!(config.log_level, "warn");

        let config = config_from(&[("RUST_LOG", "warn"), (LOG_LEVEL_VAR, "trace")])
            .expect("config should load");
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let error = config_from(&[(POLL_INTERVAL_VAR, "0")]).expect_err("zero should fail");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                key: POLL_INTERVAL_VAR,
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_log_format_and_negative_margin() {
        assert!(config_from(&[(LOG_FORMAT_VAR, "xml")]).is_err());
        assert!(config_from(&[(TIMEOUT_MARGIN_VAR, "-1")]).is_err());
        assert!(config_from(&[(DELIVERY_MAX_ATTEMPTS_VAR, "0")]).is_err());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[(POLL_INTERVAL_VAR, "  ")]).expect("blank is default");
        assert_eq!(config.poll_interval_minutes, 2);
    }
}
