//! Process-wide structured logging setup.

use tracing_subscriber::{fmt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Guard returned by [`init_logging`]. Dropping it does not itself
/// flush anything (the `fmt` subscriber writes synchronously), but its
/// presence documents the initialization lifetime the way the
/// teacher's `StructuredLogger` does.
pub struct LoggingGuard {
    _private: (),
}

/// Initialize the process-wide `tracing` subscriber.
///
/// Must be called exactly once, as early as possible in `main`.
pub fn init_logging(config: &TelemetryConfig) -> Result<LoggingGuard, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::Config(e.to_string()))?;

    let subscriber = fmt().with_env_filter(filter).with_target(true);

    let result = if config.json_logs {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(service = %config.service_name, json = config.json_logs, "logging initialized");

    Ok(LoggingGuard { _private: () })
}

/// Create structured log entries tagged with a `component` field,
/// mirroring the teacher's `log_event!` macro.
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(component = $component, $($($field)*,)? $msg)
    };
    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(component = $component, $($($field)*,)? $msg)
    };
    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(component = $component, $($($field)*,)? $msg)
    };
    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(component = $component, $($($field)*,)? $msg)
    };
}

#[cfg(test)]
mod tests {
    // Subscriber initialization is process-global and therefore is not
    // exercised in unit tests; exercised in swap-node's startup path.
}
