use super::core::ViewKeeper;
use crate::domain::RemoteServerHandle;
use crate::error::ClusterResult;
use crate::events::MembershipEvent;
use crate::ports::inbound::{
    ClusterStatistics, ClusterView, ClusterViewApi, RestoredMapping, RestoredRecord,
};

impl ClusterViewApi for ViewKeeper {
    fn restore_remote_servers(
        &self,
        records: Vec<RestoredRecord>,
    ) -> ClusterResult<Vec<RestoredMapping>> {
        ViewKeeper::restore_remote_servers(self, records)
    }

    fn recovery_completed(&self, incarnation: u64) -> ClusterResult<()> {
        ViewKeeper::recovery_completed(self, incarnation)
    }

    fn on_membership_event(&self, event: MembershipEvent) -> ClusterResult<()> {
        ViewKeeper::on_membership_event(self, event)
    }

    fn node_forwarding_connected(&self, handle: RemoteServerHandle) -> ClusterResult<()> {
        ViewKeeper::node_forwarding_connected(self, handle)
    }

    fn node_forwarding_disconnected(&self, handle: RemoteServerHandle) -> ClusterResult<()> {
        ViewKeeper::node_forwarding_disconnected(self, handle)
    }

    fn admin_delete_node(&self, handle: RemoteServerHandle) -> ClusterResult<()> {
        ViewKeeper::admin_delete_node(self, handle)
    }

    fn get_view(&self) -> ClusterView {
        ViewKeeper::get_view(self)
    }

    fn get_statistics(&self) -> ClusterStatistics {
        ViewKeeper::get_statistics(self)
    }
}
