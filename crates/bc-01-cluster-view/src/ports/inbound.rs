//! Driving Ports (API - Inbound)
//!
//! Entry points invoked by the control manager, the membership layer and the
//! forwarding layer.

use crate::domain::{
    EngineHandle, HaStatus, HealthStatus, RemoteServerHandle, RemoteServerState, Timestamp,
};
use crate::error::ClusterResult;
use crate::events::MembershipEvent;
use crate::types::ViewPhase;

/// Persisted record handed back by the engine at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoredRecord {
    pub engine_handle: EngineHandle,
    pub data: Vec<u8>,
}

/// Cluster handle assigned to a restored engine entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestoredMapping {
    pub engine_handle: EngineHandle,
    /// `RemoteServerHandle::local()` for the self-record
    pub handle: RemoteServerHandle,
}

/// One server in a view snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerView {
    pub handle: RemoteServerHandle,
    pub state: RemoteServerState,
    pub state_change_time: Timestamp,
    pub health: HealthStatus,
    pub ha: HaStatus,
    pub name: String,
    pub uid: String,
}

/// Snapshot of the cluster view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterView {
    pub local: ServerView,
    pub remote: Vec<ServerView>,
}

/// Snapshot of cluster statistics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterStatistics {
    pub phase: ViewPhase,
    pub health: HealthStatus,
    pub ha: HaStatus,
    pub cluster_name: String,
    pub server_name: String,
    pub server_uid: String,
    /// Remote servers reachable on both control and forwarding
    pub connected_servers: usize,
    pub disconnected_servers: usize,
}

/// Primary cluster view API
pub trait ClusterViewApi: Send + Sync {
    /// Bulk-load persisted records; only before `recovery_completed`.
    fn restore_remote_servers(
        &self,
        records: Vec<RestoredRecord>,
    ) -> ClusterResult<Vec<RestoredMapping>>;

    /// Fix the local incarnation for this run and start accepting traffic.
    fn recovery_completed(&self, incarnation: u64) -> ClusterResult<()>;

    /// Single entry point for membership notifications.
    ///
    /// Errors from network input are absorbed; only `LocalServerRemoved`
    /// is returned.
    fn on_membership_event(&self, event: MembershipEvent) -> ClusterResult<()>;

    fn node_forwarding_connected(&self, handle: RemoteServerHandle) -> ClusterResult<()>;

    fn node_forwarding_disconnected(&self, handle: RemoteServerHandle) -> ClusterResult<()>;

    /// Permanently remove a remote server and fence its incarnation.
    fn admin_delete_node(&self, handle: RemoteServerHandle) -> ClusterResult<()>;

    fn get_view(&self) -> ClusterView;

    fn get_statistics(&self) -> ClusterStatistics;
}
