//! Prometheus Metrics Module
//!
//! Exposes terminal session metrics in Prometheus format.
//!
//! # Metrics
//!
//! - `terminal_connect_attempts_total{result}`: connect attempts by outcome
//! - `terminal_disconnects_total`: remote disconnect signals
//! - `terminal_quote_misses_total`: quote lookups that exhausted retries
//! - `terminal_trades_fetched_total{query}`: trade records returned by query

use std::net::SocketAddr;
use std::sync::OnceLock;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::ports::TradeQuery;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics initialization error.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The exporter could not be built.
    #[error("failed to build Prometheus exporter: {0}")]
    Build(#[from] BuildError),

    /// Another global recorder is already installed.
    #[error("a global metrics recorder is already installed")]
    AlreadyInstalled,
}

/// Initialize the Prometheus metrics recorder.
///
/// With a non-zero `port` an HTTP listener serving `/metrics` is spawned on
/// the current Tokio runtime. Subsequent calls return the existing handle.
///
/// # Errors
///
/// Returns an error if the exporter cannot be built or another recorder is
/// already installed.
pub fn init_metrics(port: u16) -> Result<PrometheusHandle, MetricsError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = if port == 0 {
        PrometheusBuilder::new().install_recorder()?
    } else {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let (recorder, exporter) = PrometheusBuilder::new().with_http_listener(addr).build()?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder).map_err(|_| MetricsError::AlreadyInstalled)?;
        tokio::spawn(async move {
            if let Err(e) = exporter.await {
                tracing::error!(error = ?e, "Prometheus exporter stopped");
            }
        });
        tracing::info!(%addr, "Prometheus exporter listening");
        handle
    };

    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "terminal_connect_attempts_total",
        "Quote server connect attempts by result"
    );
    describe_counter!(
        "terminal_disconnects_total",
        "Disconnect signals received from the quote server"
    );
    describe_counter!(
        "terminal_quote_misses_total",
        "Quote lookups that returned no data after all retries"
    );
    describe_counter!(
        "terminal_trades_fetched_total",
        "Trade records returned by trade queries"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome label for connect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectResult {
    /// Session setup succeeded.
    Success,
    /// Session setup failed.
    Failure,
}

impl ConnectResult {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Record a connect attempt.
pub fn record_connect_attempt(result: ConnectResult) {
    counter!(
        "terminal_connect_attempts_total",
        "result" => result.as_str()
    )
    .increment(1);
}

/// Record a remote disconnect.
pub fn record_disconnect() {
    counter!("terminal_disconnects_total").increment(1);
}

/// Record a quote lookup that exhausted its retries.
pub fn record_quote_miss() {
    counter!("terminal_quote_misses_total").increment(1);
}

/// Record trade records returned by a query.
pub fn record_trades_fetched(query: TradeQuery, count: usize) {
    counter!(
        "terminal_trades_fetched_total",
        "query" => query.as_str()
    )
    .increment(u64::try_from(count).unwrap_or(u64::MAX));
}

// =============================================================================
// Tests
// =============================================================================
