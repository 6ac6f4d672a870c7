//! # Control Manager Service
//!
//! ```text
//! Membership ──events──→ ControlManager ──→ ViewKeeper
//!                             ↑    │             │
//! Forwarding ──signals──→ FIFO ┘    └←── ViewTask ┘ ──→ MembershipService
//! ```

mod admin;
mod core;
mod events;
mod maintenance;
mod tasks;

pub use self::admin::DetachOutcome;
pub use self::core::{ControlManager, ControlState, ViewNotification};
