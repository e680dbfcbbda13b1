//! # Swap Telemetry
//!
//! Structured logging for the cross-chain swap orchestrator.
//!
//! Grounded in the teacher's `quantum-telemetry` crate, narrowed to its
//! `tracing`/`tracing-subscriber` logging layer: metrics emission
//! (Prometheus/Mimir) and trace export (OpenTelemetry/Tempo) are
//! dropped because the spec treats metrics and UI-facing observability
//! as out of scope, leaving them to an external operator-supplied
//! sidecar rather than this crate.

#![warn(missing_docs)]

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, LoggingGuard};

use thiserror::Error;

/// Telemetry initialization errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The `tracing_subscriber` global subscriber failed to install.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    /// The configured log level/filter string was invalid.
    #[error("invalid telemetry configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_service_name() {
        assert_eq!(TelemetryConfig::default().service_name, "swap-orchestrator");
    }
}
