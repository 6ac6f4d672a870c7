//! # bc-telemetry
//!
//! Structured logging for the broker cluster crates.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bc_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     init_logging(&config).expect("logging already initialized");
//!     let _root = bc_telemetry::service_span(&config).entered();
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BC_SERVICE_NAME` | `broker-cluster` | Service name on the root span |
//! | `BC_LOG_LEVEL` | `info` | Filter directive, falls back to `RUST_LOG` |
//! | `BC_JSON_LOGS` | `false` | JSON lines; defaults to true in containers |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{build_subscriber, init_logging, service_span};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install subscriber: {0}")]
    Init(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
