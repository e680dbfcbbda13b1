//! Logging configuration from environment variables.

use std::env;

/// Configuration for the orchestrator's structured logging.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line.
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error), or an
    /// `env-filter` directive string such as `swap_core=debug,info`.
    pub log_level: String,

    /// Whether to emit JSON-formatted logs (container deployments)
    /// instead of the human-readable console format.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "swap-orchestrator".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Build configuration from environment variables.
    ///
    /// - `SWAP_LOG_LEVEL` or `RUST_LOG`: log level/filter (default `info`)
    /// - `SWAP_JSON_LOGS`: emit JSON logs (default: true inside a
    ///   container, false otherwise)
    /// - `SWAP_SERVICE_NAME`: service name (default `swap-orchestrator`)
    pub fn from_env() -> Self {
        let is_container = env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("SWAP_SERVICE_NAME").unwrap_or_else(|_| "swap-orchestrator".to_string()),
            log_level: env::var("SWAP_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
            json_logs: env::var("SWAP_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_info_level() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }
}
