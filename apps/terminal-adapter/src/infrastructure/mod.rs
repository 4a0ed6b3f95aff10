//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Configuration from environment variables and account ini blobs.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Default lifecycle observer (tracing + metrics).
pub mod observability;

/// Quote client implementations.
pub mod quote_client;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// Terminal adapter and record mapping.
pub mod terminal;
