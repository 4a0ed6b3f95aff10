#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::default_trait_access
    )
)]

//! Terminal Adapter - Quote Server Session Bridge
//!
//! Connects one trading account to a remote quote server, keeps the session's
//! lifecycle observable, and exposes open trades, closed-trade history and
//! quotes as normalized records.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Account identity, trade records and session state
//!   - `account`: Credentials, labels, session ids
//!   - `trading`: Trade records, code tables, quotes
//!   - `session`: Session state and disconnect events
//!
//! - **Application**: Port definitions
//!   - `TradingTerminalPort`: What upstream services call
//!   - `QuoteConnector` / `QuoteSession`: The remote quote client capability
//!   - `TerminalObserver`: Lifecycle hooks
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `terminal`: `TerminalAdapter` and `RecordMapper`
//!   - `quote_client`: In-process simulated quote server
//!   - `config`: Environment and account ini loading
//!   - `observability`, `metrics`, `telemetry`: Logs, counters, traces
//!
//! # Data Flow
//!
//! ```text
//! caller ──► TerminalAdapter ──► QuoteSession (remote)
//!                 │    ▲                │
//!                 │    └─ RecordMapper ◄┘ orders / quotes
//!                 └──► broadcast<TerminalDisconnected> ◄── disconnect signal
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Trade records and account identity, no I/O.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::account::{AccountCredentials, AccountId, AccountLabel, SessionId};
pub use domain::session::{SessionState, TerminalDisconnected};
pub use domain::trading::{PlacedReason, Quote, TradeRecord, TradeState, TradeType};

// Ports
pub use application::ports::{
    QuoteConnector, QuoteSession, RemoteFault, TerminalError, TerminalObserver, TradingTerminalPort,
};

// Adapter
pub use infrastructure::terminal::{RecordMapper, TerminalAdapter};

// Configuration
pub use infrastructure::config::{
    AppConfig, ConfigError, QuoteRetrySettings, TerminalSettings, load_account_file,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
