use super::callout::Callout;
use super::core::ViewKeeper;
use crate::domain::RemoteServerHandle;
use crate::error::ClusterResult;
use tracing::{debug, info};

impl ViewKeeper {
    /// Forwarding channel to a remote server came up.
    ///
    /// The engine hears `connected` once, when control and forwarding are
    /// both up. Repeated signals are no-ops.
    pub fn node_forwarding_connected(&self, handle: RemoteServerHandle) -> ClusterResult<()> {
        let now = self.now();
        self.run(|state, out| {
            if state.phase.is_terminated() {
                return;
            }
            let Some(record) = state.record_mut(handle) else {
                debug!(%handle, "forwarding connected for stale handle");
                return;
            };
            if record.forwarding.connected() {
                return;
            }
            record.forwarding.connect();
            record.touch(now);
            if record.control.connected() && record.engine.added() && !record.engine.connected() {
                record.engine.connect();
                out.push(Callout::EngineConnected(record.server_ref()));
                info!(uid = %record.uid, index = handle.index(), "remote server connected");
            }
        });
        Ok(())
    }

    pub fn node_forwarding_disconnected(&self, handle: RemoteServerHandle) -> ClusterResult<()> {
        let now = self.now();
        self.run(|state, out| {
            if state.phase.is_terminated() {
                return;
            }
            let Some(record) = state.record_mut(handle) else {
                debug!(%handle, "forwarding disconnected for stale handle");
                return;
            };
            if !record.forwarding.connected() {
                return;
            }
            record.forwarding.disconnect();
            record.touch(now);
            if record.engine.connected() {
                record.engine.disconnect();
                out.push(Callout::EngineDisconnected(record.server_ref()));
                info!(uid = %record.uid, index = handle.index(), "remote server disconnected");
            }
        });
        Ok(())
    }
}
