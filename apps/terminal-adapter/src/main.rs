//! Terminal Adapter Binary
//!
//! Connects one account to the in-process quote server and polls its open
//! trades until shut down.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin terminal-adapter
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `TERMINAL_ACCOUNT_ID`: Numeric account id
//! - `TERMINAL_ACCOUNT_FILE`: Path of the account ini (`[MT4]` Login, Password, Server, Port)
//!
//! ## Optional
//! - `TERMINAL_POLL_INTERVAL_SECS`: Open-trade poll interval (default: 30)
//! - `TERMINAL_METRICS_PORT`: Prometheus metrics port, 0 disables the listener (default: 9090)
//! - `TERMINAL_QUOTE_MAX_ATTEMPTS`: Quote lookups per request (default: 10)
//! - `TERMINAL_QUOTE_RETRY_INTERVAL_MS`: Pause between quote lookups (default: 100)
//! - `TERMINAL_CONNECT_TIMEOUT_SECS`: Handshake timeout (default: 30)
//! - `TERMINAL_CONNECT_POLL_MS`: Handshake poll interval (default: 50)
//! - `TERMINAL_EVENT_CAPACITY`: Disconnect channel capacity (default: 64)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: terminal-adapter)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use terminal_adapter::application::ports::RemoteOrder;
use terminal_adapter::infrastructure::config::{AppConfig, load_account_file};
use terminal_adapter::infrastructure::quote_client::SimulatedQuoteConnector;
use terminal_adapter::infrastructure::telemetry;
use terminal_adapter::{TerminalAdapter, init_metrics};

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Symbol whose quote is logged on every poll.
const WATCHED_SYMBOL: &str = "EURUSD";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Terminal Adapter");

    let config = AppConfig::from_env().context("loading configuration")?;
    log_config(&config);

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics(config.metrics_port).context("installing metrics recorder")?;

    let credentials = load_account_file(config.account_id, &config.account_file)
        .with_context(|| format!("loading account file {}", config.account_file.display()))?;

    let connector = seeded_connector();
    let adapter = Arc::new(
        TerminalAdapter::new(credentials, Arc::new(connector))
            .with_settings(config.terminal.clone()),
    );

    adapter
        .connect_and_wait(config.terminal.connect_timeout)
        .await
        .context("connecting to quote server")?;

    let shutdown_token = CancellationToken::new();

    // Spawn disconnect event logger
    let mut disconnects = adapter.subscribe_disconnects();
    let events_token = shutdown_token.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = events_token.cancelled() => break,
                received = disconnects.recv() => match received {
                    Ok(event) => tracing::warn!(
                        account = %event.account,
                        session_id = %event.session_id,
                        reason = %event.reason,
                        "Quote server session lost"
                    ),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Disconnect events dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });

    // Spawn poller
    let poll_adapter = Arc::clone(&adapter);
    let poll_token = shutdown_token.clone();
    let poll_interval = config.poll_interval;
    let poller = tokio::spawn(async move {
        poll_trades(&poll_adapter, poll_interval, &poll_token).await;
    });

    tracing::info!("Terminal adapter ready");

    await_shutdown(shutdown_token).await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, poller).await.is_err() {
        tracing::warn!("Poller did not stop in time");
    }
    adapter.disconnect();

    tracing::info!("Terminal adapter stopped");
    Ok(())
}

/// Poll open and recently closed trades until `token` is cancelled.
async fn poll_trades(adapter: &TerminalAdapter, interval: Duration, token: &CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    let started = Utc::now();

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !adapter.is_connected() {
            adapter.reset_subscription();
            if let Err(e) = adapter
                .connect_and_wait(adapter.settings().connect_timeout)
                .await
            {
                tracing::error!(error = %e, "Reconnect failed");
                continue;
            }
        }

        match adapter.get_all_trades_async(token).await {
            Ok(trades) => match serde_json::to_string(&trades) {
                Ok(json) => tracing::debug!(count = trades.len(), trades = %json, "Open trades"),
                Err(e) => tracing::warn!(error = %e, "Could not serialize open trades"),
            },
            Err(e) if e.is_cancelled() => break,
            Err(e) => tracing::error!(error = %e, "Open trade poll failed"),
        }

        match adapter.get_close_trades_async(started, token).await {
            Ok(closed) => tracing::debug!(count = closed.len(), "Closed trades since start"),
            Err(e) if e.is_cancelled() => break,
            Err(e) => tracing::error!(error = %e, "Closed trade poll failed"),
        }

        if let Some(quote) = adapter.get_quote(WATCHED_SYMBOL).await {
            tracing::info!(
                symbol = %quote.symbol,
                bid = %quote.bid,
                ask = %quote.ask,
                spread = %quote.spread(),
                "Quote"
            );
        }
    }
}

/// Quote server with a small demo book.
fn seeded_connector() -> SimulatedQuoteConnector {
    let connector = SimulatedQuoteConnector::new();
    let now = Utc::now().naive_utc();

    connector.set_open_orders(vec![
        demo_order(1001, 0, "EURUSD", Decimal::new(10, 2), now - ChronoDuration::hours(3)),
        demo_order(1002, 1, "XAUUSD", Decimal::new(5, 2), now - ChronoDuration::minutes(40)),
    ]);
    connector.set_quote(WATCHED_SYMBOL, Decimal::new(108_450, 5), Decimal::new(108_462, 5));
    connector.set_quote("XAUUSD", Decimal::new(231_050, 2), Decimal::new(231_085, 2));
    connector
}

fn demo_order(
    ticket: i32,
    order_type: i32,
    symbol: &str,
    lots: Decimal,
    open_time: chrono::NaiveDateTime,
) -> RemoteOrder {
    RemoteOrder {
        ticket,
        order_type,
        state: Some(0),
        magic_number: 0,
        lots,
        open_time,
        open_price: Decimal::ONE,
        symbol: symbol.to_string(),
        comment: "demo".to_string(),
        close_time: chrono::NaiveDateTime::default(),
        profit: Decimal::ZERO,
        take_profit: Decimal::ZERO,
        commission: Decimal::ZERO,
        stop_loss: Decimal::ZERO,
        swap: Decimal::ZERO,
        close_price: Decimal::ZERO,
        placed_reason: 0,
    }
}

/// Log the parsed configuration.
fn log_config(config: &AppConfig) {
    tracing::info!(
        account_id = %config.account_id,
        account_file = %config.account_file.display(),
        poll_interval_secs = config.poll_interval.as_secs(),
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        quote_attempts = config.terminal.quote.max_attempts,
        quote_interval_ms = u64::try_from(config.terminal.quote.interval.as_millis()).unwrap_or(u64::MAX),
        connect_timeout_secs = config.terminal.connect_timeout.as_secs(),
        "Terminal settings"
    );
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
