//! # bc-01-cluster-view
//!
//! Cluster view keeper for a broker cluster: the registry of remote servers,
//! the ordering of their covering-filter updates and incarnation fencing.
//!
//! ## Overview
//!
//! This subsystem provides:
//! - **Remote server registry**: one record per remote server, addressed by a
//!   generation-checked index handle
//! - **Filter sequencing**: base and update items are applied in order, gaps
//!   request a fresh base
//! - **Incarnation fencing**: deleted `(uid, incarnation)` pairs never rejoin
//! - **Restart reconciliation**: restored servers are routed as wildcard
//!   destinations until live filter state catches up
//!
//! ## Architecture
//!
//! ```text
//! Membership ──MembershipEvent──→ ┐
//! Forwarding ──connected/disc.──→ ├─→ ViewKeeper ──callouts──→ Engine
//! Control    ──restore/delete───→ ┘        │              └──→ Forwarding control
//!                                          └── ViewTask ──→ Control manager
//! ```
//!
//! ## Phases
//!
//! ```text
//! [STARTED] ──restore──→ [RECOVERING] ──recovery_completed──→ [ACTIVE]
//!     │                                                          │
//!     └─────────────────recovery_completed───────────────────────┤
//!                                                                ↓
//!                                          [CLOSED] ←──close── [DETACHED]
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use bc_01_cluster_view::{ClusterViewConfig, ViewKeeper};
//! use bc_01_cluster_view::ports::SystemTimeSource;
//!
//! let keeper = ViewKeeper::new(config, Arc::new(SystemTimeSource))?;
//! keeper.register_engine(engine)?;
//! keeper.register_forwarding(forwarding)?;
//!
//! let mappings = keeper.restore_remote_servers(stored_records)?;
//! keeper.recovery_completed(incarnation)?;
//!
//! keeper.on_membership_event(event)?;
//! for task in keeper.take_pending_tasks() {
//!     // hand to the control manager
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod events;
pub mod ports;
pub mod service;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::BincodeRecordCodec;
pub use domain::{
    EngineHandle, FilterKind, FilterUpdate, ForwardingEndpoint, HaStatus, HealthStatus,
    MonitoringStatus, ProtocolVersionRange, RemoteServerHandle, RemoteServerState,
    RemovedServers, ServerInfo, ServerRef, Timestamp,
};
pub use error::{ClusterError, ClusterResult};
pub use events::{
    LeaveReason, MembershipEvent, NodeInfo, NodeMetadata, NodeStatus, ViewMember, ViewTask,
};
pub use ports::{
    CallbackError, CallbackResult, ClusterStatistics, ClusterView, ClusterViewApi,
    EngineCallbacks, EngineStatistics, ForwardingControl, RecordCodec, RestoredMapping,
    RestoredRecord, ServerView, SystemTimeSource, TimeSource,
};
pub use service::ViewKeeper;
pub use types::{ClusterViewConfig, ViewPhase};
