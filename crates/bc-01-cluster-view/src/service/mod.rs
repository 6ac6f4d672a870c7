//! # View Keeper Service
//!
//! Owns the remote server registry and implements `ClusterViewApi`.
//!
//! ```text
//! Membership ──events──→ ┐
//! Forwarding ──signals─→ ├─→ ViewKeeper ──callouts──→ Engine / Forwarding control
//! Control    ──admin───→ ┘        │
//!                                 └──tasks──→ Control manager
//! ```

mod admin;
mod api;
mod callout;
mod core;
mod filters;
mod forwarding;
mod maintenance;
mod membership;
mod queries;
mod recovery;
mod state;

pub use self::core::ViewKeeper;
