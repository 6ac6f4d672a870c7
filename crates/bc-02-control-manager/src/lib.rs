//! # bc-02-control-manager
//!
//! Orchestration shell of the cluster component.
//!
//! ## Overview
//!
//! - **Event wiring**: membership events go to the `ViewKeeper`; fatal
//!   results request maintenance mode through `FatalErrorHandler`
//! - **Task execution**: tasks queued by the view (publish removed servers,
//!   delete fenced servers, request fresh filter bases, clear retained
//!   attributes) run one at a time against `MembershipService`
//! - **Forwarding signals**: connect and disconnect signals are queued and
//!   delivered in FIFO order
//! - **Detach**: leaving the cluster waits at most `detach_timeout` for an
//!   acknowledgment
//! - **Maintenance**: `spawn_maintenance` runs the GC sweep, signal delivery
//!   and the statistics pull on a tokio interval
//!
//! ## Example
//!
//! ```rust,ignore
//! use bc_02_control_manager::{ControlManager, TomlConfigProvider};
//!
//! let config = TomlConfigProvider::load("cluster.toml")?.into_config();
//! let manager = Arc::new(ControlManager::from_config(
//!     config, engine, forwarding, membership, fatal_handler,
//! )?);
//!
//! manager.restore_remote_servers(stored_records)?;
//! manager.recovery_completed(incarnation).await?;
//! let maintenance = manager.spawn_maintenance();
//!
//! // later
//! let outcome = manager.admin_detach_from_cluster().await?;
//! manager.close();
//! maintenance.await?;
//! ```

pub mod config;
pub mod error;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ControlConfig, TomlConfigProvider, ViewSettings};
pub use error::{ControlError, ControlResult};
pub use ports::{FatalErrorHandler, MembershipService};
pub use service::{ControlManager, ControlState, DetachOutcome, ViewNotification};
