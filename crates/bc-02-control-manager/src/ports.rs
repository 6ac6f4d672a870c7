//! Driven ports of the control manager
//!
//! The membership layer owns gossip, retained attributes and the cluster
//! leave handshake. The host process decides what a fatal cluster error means
//! for the server as a whole.

use crate::error::ControlResult;
use async_trait::async_trait;
use bc_01_cluster_view::{ClusterError, FilterKind, RemovedServers, ServerRef};

/// Requests the control manager makes of the membership layer.
#[async_trait]
pub trait MembershipService: Send + Sync {
    /// Gossip the local removed servers list.
    async fn publish_removed_servers(&self, removed: &RemovedServers) -> ControlResult<()>;

    /// Ask `uid` to publish a new base for `kind`.
    async fn request_fresh_base(&self, uid: &str, kind: FilterKind) -> ControlResult<()>;

    /// Drop the retained attributes of a deleted server.
    ///
    /// Returns `false` when the membership layer refuses because the server
    /// is still alive.
    async fn clear_retained_attributes(&self, uid: &str, incarnation: u64) -> ControlResult<bool>;

    /// Announce restored servers the membership layer has not reported.
    async fn publish_restored_not_in_view(&self, servers: &[ServerRef]) -> ControlResult<()>;

    /// Leave the cluster, resolving once the cluster acknowledged it.
    async fn leave_cluster(&self) -> ControlResult<()>;
}

/// Host hook for errors the cluster component cannot recover from.
pub trait FatalErrorHandler: Send + Sync {
    /// The server must restart in maintenance mode.
    fn request_maintenance_mode(&self, error: &ClusterError);
}
