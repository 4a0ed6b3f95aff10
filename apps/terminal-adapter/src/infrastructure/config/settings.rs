//! Terminal Configuration Settings
//!
//! Configuration types for the terminal adapter and its binary, loaded from
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::account::AccountId;

/// Upper bound on quote lookup attempts.
pub const MAX_QUOTE_ATTEMPTS: u32 = 10;

/// Quote lookup retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteRetrySettings {
    /// Total lookup attempts, including the first. Capped at
    /// `MAX_QUOTE_ATTEMPTS`.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub interval: Duration,
}

impl Default for QuoteRetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: MAX_QUOTE_ATTEMPTS,
            interval: Duration::from_millis(100),
        }
    }
}

/// Terminal adapter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalSettings {
    /// Quote retry policy.
    pub quote: QuoteRetrySettings,
    /// How long `connect_and_wait` waits for the handshake.
    pub connect_timeout: Duration,
    /// How often `connect_and_wait` polls the session.
    pub connect_poll_interval: Duration,
    /// Capacity of the disconnect event channel.
    pub event_capacity: usize,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            quote: QuoteRetrySettings::default(),
            connect_timeout: Duration::from_secs(30),
            connect_poll_interval: Duration::from_millis(50),
            event_capacity: 64,
        }
    }
}

impl TerminalSettings {
    /// Create settings from environment variables.
    ///
    /// Unset or unparseable values fall back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create settings from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let max_attempts = parse_u32(
            &lookup,
            "TERMINAL_QUOTE_MAX_ATTEMPTS",
            defaults.quote.max_attempts,
        )
        .clamp(1, MAX_QUOTE_ATTEMPTS);

        Self {
            quote: QuoteRetrySettings {
                max_attempts,
                interval: parse_duration_millis(
                    &lookup,
                    "TERMINAL_QUOTE_RETRY_INTERVAL_MS",
                    defaults.quote.interval,
                ),
            },
            connect_timeout: parse_duration_secs(
                &lookup,
                "TERMINAL_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout,
            ),
            connect_poll_interval: parse_duration_millis(
                &lookup,
                "TERMINAL_CONNECT_POLL_MS",
                defaults.connect_poll_interval,
            ),
            event_capacity: parse_usize(&lookup, "TERMINAL_EVENT_CAPACITY", defaults.event_capacity)
                .max(1),
        }
    }
}

/// Configuration of the `terminal-adapter` binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Account to connect.
    pub account_id: AccountId,
    /// Path of the account's ini blob.
    pub account_file: PathBuf,
    /// Interval between open-trade polls.
    pub poll_interval: Duration,
    /// Prometheus metrics port (0 = no HTTP listener).
    pub metrics_port: u16,
    /// Adapter settings.
    pub terminal: TerminalSettings,
}

impl AppConfig {
    /// Default poll interval.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

    /// Default metrics port.
    pub const DEFAULT_METRICS_PORT: u16 = 9090;

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if required keys are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_id = required(&lookup, "TERMINAL_ACCOUNT_ID")?;
        let account_id = raw_id
            .trim()
            .parse::<i64>()
            .map(AccountId::new)
            .map_err(|_| ConfigError::InvalidValue {
                key: "TERMINAL_ACCOUNT_ID".to_string(),
                reason: format!("'{raw_id}' is not an integer"),
            })?;

        let account_file = PathBuf::from(required(&lookup, "TERMINAL_ACCOUNT_FILE")?);

        Ok(Self {
            account_id,
            account_file,
            poll_interval: parse_duration_secs(
                &lookup,
                "TERMINAL_POLL_INTERVAL_SECS",
                Self::DEFAULT_POLL_INTERVAL,
            ),
            metrics_port: parse_u16(&lookup, "TERMINAL_METRICS_PORT", Self::DEFAULT_METRICS_PORT),
            terminal: TerminalSettings::from_lookup(&lookup),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),

    /// Required key is missing from the account configuration.
    #[error("missing required account setting: {0}")]
    MissingKey(String),

    /// A value is present but unusable.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Offending key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The account blob could not be parsed.
    #[error("failed to parse account configuration: {0}")]
    Parse(#[from] ::config::ConfigError),

    /// The account file could not be read.
    #[error("failed to read account file {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_u16(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u16) -> u16 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_u32(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> u32 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
