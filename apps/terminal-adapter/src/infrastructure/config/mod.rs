//! Configuration Module
//!
//! Account credential loading and adapter settings.

mod account;
mod settings;

pub use account::{DEFAULT_SERVER_PORT, load_account_file, parse_account_ini};
pub use settings::{
    AppConfig, ConfigError, MAX_QUOTE_ATTEMPTS, QuoteRetrySettings, TerminalSettings,
};
