use super::callout::Callout;
use super::core::ViewKeeper;
use crate::domain::{HaStatus, HealthStatus, RemoteServerHandle};
use crate::error::{ClusterError, ClusterResult};
use crate::events::ViewTask;
use crate::ports::outbound::EngineStatistics;
use crate::types::ViewPhase;
use tracing::{debug, info};

impl ViewKeeper {
    /// Permanently remove a remote server.
    ///
    /// The server's `(uid, incarnation)` is fenced, forwarding and engine are
    /// told to drop it and its index is tombstoned. Deleting an already
    /// deleted handle is a no-op until its tombstone is swept.
    pub fn admin_delete_node(&self, handle: RemoteServerHandle) -> ClusterResult<()> {
        if handle.is_local() {
            return Err(ClusterError::LocalServer);
        }
        let now = self.now();
        self.run(|state, out| {
            if state.phase == ViewPhase::Closed {
                return Err(ClusterError::NotAvailable {
                    operation: "admin_delete_node",
                    phase: state.phase.to_string(),
                });
            }
            if state.is_tombstoned(handle) {
                debug!(%handle, "server already deleted");
                return Ok(());
            }
            let Some(record) = state.remove_record(handle, now) else {
                return Err(ClusterError::UnknownServer { handle });
            };

            let server = record.server_ref();
            if record.forwarding.added() {
                out.push(Callout::ForwardingRemove(server.clone()));
            }
            if let Some(engine) = record.engine_handle {
                out.push(Callout::EngineRemove {
                    server: server.clone(),
                    engine,
                });
            }
            if state.removed.insert(&record.uid, record.incarnation) {
                self.publish_removed_servers(state, out);
            }
            state.pending_tasks.push(ViewTask::ClearRetainedAttributes {
                uid: record.uid.clone(),
                incarnation: record.incarnation,
            });
            info!(
                uid = %record.uid,
                index = handle.index(),
                incarnation = record.incarnation,
                connected = record.is_connected(),
                "remote server deleted"
            );
            Ok(())
        })
    }

    /// Delete the live record for `uid` if its incarnation is fenced by `incarnation`.
    ///
    /// Returns whether a record was deleted.
    pub fn admin_delete_node_by_uid(&self, uid: &str, incarnation: u64) -> ClusterResult<bool> {
        let handle = self.read(|state| {
            state
                .handle_for_uid(uid)
                .and_then(|handle| state.record(handle))
                .filter(|record| record.incarnation <= incarnation)
                .map(|record| record.handle)
        });
        match handle {
            Some(handle) => self.admin_delete_node(handle).map(|()| true),
            None => Ok(false),
        }
    }

    /// Replace the local subscription patterns kept in the self-record.
    pub fn update_subscription_patterns(&self, patterns: Vec<String>) -> ClusterResult<()> {
        self.run(|state, out| {
            if state.phase.is_terminated() {
                return Err(ClusterError::NotAvailable {
                    operation: "update_subscription_patterns",
                    phase: state.phase.to_string(),
                });
            }
            state.local.patterns = patterns;
            if state.phase == ViewPhase::Active {
                self.persist_self(state, out);
            }
            Ok(())
        })
    }

    /// Local monitoring status reported in views and statistics.
    pub fn set_local_status(&self, health: HealthStatus, ha: HaStatus) {
        self.run(|state, _| {
            state.local.health = health;
            state.local.ha = ha;
        });
    }

    /// Pull the engine's cumulative forwarding statistics.
    pub fn report_engine_statistics(&self) -> ClusterResult<EngineStatistics> {
        let guard = self.inner.lock();
        let engine = {
            let state = guard.borrow();
            if state.phase != ViewPhase::Active {
                return Err(ClusterError::NotAvailable {
                    operation: "report_engine_statistics",
                    phase: state.phase.to_string(),
                });
            }
            state
                .engine
                .clone()
                .ok_or(ClusterError::CallbacksNotRegistered { missing: "engine" })?
        };
        engine
            .report_statistics()
            .map_err(|err| ClusterError::Callback {
                callback: "engine.report_statistics",
                reason: err.to_string(),
            })
    }

    /// Detach from the cluster: stop processing events and terminate the
    /// forwarding layer and the engine.
    pub fn notify_term(&self) {
        self.run(|state, out| {
            if state.phase.is_terminated() {
                return;
            }
            state.phase = ViewPhase::Detached;
            out.push(Callout::ForwardingTerm);
            out.push(Callout::EngineTerm);
            info!("view keeper detached");
        });
    }

    pub fn close(&self) {
        self.run(|state, _| {
            state.phase = ViewPhase::Closed;
            state.engine = None;
            state.forwarding = None;
            info!("view keeper closed");
        });
    }
}
