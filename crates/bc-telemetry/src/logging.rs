//! Subscriber setup and logging macros.
//!
//! JSON output carries `timestamp`, `level`, `target` and the event fields,
//! so log shippers can parse lines without a custom format.

use crate::{TelemetryConfig, TelemetryError};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Build a subscriber writing to `writer`.
pub fn build_subscriber<W>(
    config: &TelemetryConfig,
    writer: W,
) -> Result<Box<dyn Subscriber + Send + Sync>, TelemetryError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("{}: {e}", config.log_level)))?;
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        let layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(writer);
        Ok(Box::new(registry.with(layer)))
    } else {
        let layer = fmt::layer()
            .with_target(true)
            .with_ansi(config.ansi)
            .with_writer(writer);
        Ok(Box::new(registry.with(layer)))
    }
}

/// Install the global subscriber, writing to stderr.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let subscriber = build_subscriber(config, std::io::stderr)?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| TelemetryError::Init(e.to_string()))?;
    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "logging initialized"
    );
    Ok(())
}

/// Root span carrying the service name.
pub fn service_span(config: &TelemetryConfig) -> tracing::Span {
    tracing::info_span!("service", name = %config.service_name)
}

/// Log an event tagged with the emitting component.
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log an event about one remote server with the standard fields.
#[macro_export]
macro_rules! log_server_event {
    ($level:ident, $component:expr, $msg:expr, $uid:expr, $incarnation:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            uid = %$uid,
            incarnation = $incarnation,
            $($($field)*,)?
            $msg
        )
    };
}
