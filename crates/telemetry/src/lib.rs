//! Structured JSON logging, shared by the server and client binaries.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Telemetry setup failures.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The global `tracing` subscriber was already set by something else.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Install a JSON-formatted `tracing` subscriber, filtered by `RUST_LOG`
/// (defaulting to `info`).
///
/// Returns [`TelemetryError::AlreadyInitialized`] if a global subscriber was
/// already set; callers that only want best-effort setup (tests, examples
/// that may run alongside other initialized binaries) can ignore the error.
pub fn init_json_logging() -> Result<(), TelemetryError> {
    let fmt_layer = fmt::layer().json().with_current_span(true).with_span_list(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).map_err(|_| TelemetryError::AlreadyInitialized)
}
