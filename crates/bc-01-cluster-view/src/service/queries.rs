use super::core::ViewKeeper;
use crate::domain::{
    HaStatus, HealthStatus, RemoteServerHandle, RemoteServerRecord, RemoteServerState, ServerRef,
};
use crate::ports::inbound::{ClusterStatistics, ClusterView, ServerView};
use crate::types::ViewPhase;

fn server_view(record: &RemoteServerRecord) -> ServerView {
    let state = record.view_state();
    let (health, ha) = if state == RemoteServerState::Inactive {
        (HealthStatus::Unknown, HaStatus::Unknown)
    } else {
        (record.health, record.ha)
    };
    ServerView {
        handle: record.handle,
        state,
        state_change_time: record.connectivity_change_time,
        health,
        ha,
        name: record.name.clone(),
        uid: record.uid.clone(),
    }
}

impl ViewKeeper {
    /// Snapshot of the local server and every remote server known to forwarding.
    pub fn get_view(&self) -> ClusterView {
        self.read(|state| {
            let local_state = match state.phase {
                ViewPhase::Active => RemoteServerState::Active,
                ViewPhase::Started | ViewPhase::Recovering => RemoteServerState::Connecting,
                ViewPhase::Detached | ViewPhase::Closed => RemoteServerState::Inactive,
            };
            let local = ServerView {
                handle: RemoteServerHandle::local(),
                state: local_state,
                state_change_time: state.local.state_change_time,
                health: state.local.health,
                ha: state.local.ha,
                name: state.local.name.clone(),
                uid: state.local.uid.clone(),
            };
            let remote = state
                .records()
                .filter(|record| record.forwarding.added())
                .map(server_view)
                .collect();
            ClusterView { local, remote }
        })
    }

    pub fn get_statistics(&self) -> ClusterStatistics {
        self.read(|state| {
            let total = state.live_count();
            let connected = state.records().filter(|r| r.is_connected()).count();
            ClusterStatistics {
                phase: state.phase,
                health: state.local.health,
                ha: state.local.ha,
                cluster_name: state.local.cluster_name.clone(),
                server_name: state.local.name.clone(),
                server_uid: state.local.uid.clone(),
                connected_servers: connected,
                disconnected_servers: total - connected,
            }
        })
    }

    /// View of one server, if the handle is live.
    pub fn server(&self, handle: RemoteServerHandle) -> Option<ServerView> {
        self.read(|state| state.record(handle).map(server_view))
    }

    pub fn handle_for_uid(&self, uid: &str) -> Option<RemoteServerHandle> {
        self.read(|state| state.handle_for_uid(uid))
    }

    /// Whether the server is currently routed as a wildcard destination.
    pub fn is_route_all(&self, handle: RemoteServerHandle) -> Option<bool> {
        self.read(|state| state.record(handle).map(|r| r.route_all))
    }

    /// Restored servers the membership layer has not reported yet.
    pub fn get_restored_not_in_view(&self) -> Vec<ServerRef> {
        self.read(|state| {
            state
                .records()
                .filter(|r| r.is_restored_not_in_view())
                .map(RemoteServerRecord::server_ref)
                .collect()
        })
    }

    /// True once no restored server is still waiting for reconciliation.
    pub fn is_reconciliation_finished(&self) -> bool {
        self.read(|state| state.records().all(|r| r.recovery.is_none()))
    }

    /// Snapshot of the fencing set.
    pub fn removed_servers(&self) -> crate::domain::RemovedServers {
        self.read(|state| state.removed.clone())
    }

    pub fn local_incarnation(&self) -> u64 {
        self.read(|state| state.local.incarnation)
    }

    /// Subscription patterns restored from or written to the self-record.
    pub fn local_patterns(&self) -> Vec<String> {
        self.read(|state| state.local.patterns.clone())
    }
}
