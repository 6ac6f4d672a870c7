//! Startup recovery
//!
//! ```text
//! restore_remote_servers(records) ──→ [RECOVERING] ──recovery_completed(inc)──→ [ACTIVE]
//! ```
//!
//! Any error here is fatal: the host must not continue with a partially
//! restored registry.

use super::core::ViewKeeper;
use super::state::ViewKeeperState;
use super::callout::Callout;
use crate::domain::{
    EngineHandle, FilterSequences, RecoveryFilterState, RemoteServerHandle, StoredRecord,
    StoredRemoteRecord, StoredSelfRecord, Timestamp,
};
use crate::error::{ClusterError, ClusterResult};
use crate::ports::inbound::{RestoredMapping, RestoredRecord};
use crate::types::ViewPhase;
use std::collections::HashSet;
use tracing::{error, info, warn};

impl ViewKeeper {
    /// Bulk-load records persisted by the engine during a previous run.
    ///
    /// The whole batch is decoded and checked before the registry is touched,
    /// so a failure leaves the keeper exactly as it was.
    pub fn restore_remote_servers(
        &self,
        records: Vec<RestoredRecord>,
    ) -> ClusterResult<Vec<RestoredMapping>> {
        let now = self.now();
        let result = self.run(|state, _| {
            if !state.phase.accepts_restore() {
                return Err(ClusterError::Recovery {
                    reason: format!("restore not allowed while {}", state.phase),
                });
            }
            let batch = self.decode_batch(state, records)?;
            state.phase = ViewPhase::Recovering;

            let mut mappings = Vec::with_capacity(batch.len());
            for (stored, engine_handle) in batch {
                let handle = match stored {
                    StoredRecord::Local(stored) => {
                        self.restore_self(state, stored, engine_handle);
                        RemoteServerHandle::local()
                    }
                    StoredRecord::Remote(stored) => {
                        self.restore_remote(state, stored, engine_handle, now)?
                    }
                };
                mappings.push(RestoredMapping {
                    engine_handle,
                    handle,
                });
            }
            info!(
                restored = mappings.len(),
                live = state.live_count(),
                "restored persisted cluster records"
            );
            Ok(mappings)
        });
        if let Err(err) = &result {
            error!(error = %err, "restore failed");
        }
        result
    }

    fn decode_batch(
        &self,
        state: &ViewKeeperState,
        records: Vec<RestoredRecord>,
    ) -> ClusterResult<Vec<(StoredRecord, EngineHandle)>> {
        let mut batch = Vec::with_capacity(records.len());
        let mut remote_uids = HashSet::new();
        for restored in records {
            let stored = self.codec.decode(&restored.data)?;
            match &stored {
                StoredRecord::Local(local) => {
                    if local.uid != state.local.uid && !self.config.allow_recovery_with_uid_change {
                        return Err(ClusterError::StoreOwnershipConflict {
                            record_uid: local.uid.clone(),
                            local_uid: state.local.uid.clone(),
                        });
                    }
                }
                StoredRecord::Remote(remote) => {
                    if remote.uid == state.local.uid {
                        return Err(ClusterError::StoreOwnershipConflict {
                            record_uid: remote.uid.clone(),
                            local_uid: state.local.uid.clone(),
                        });
                    }
                    if state.handle_for_uid(&remote.uid).is_some()
                        || !remote_uids.insert(remote.uid.clone())
                    {
                        return Err(ClusterError::Recovery {
                            reason: format!("duplicate remote record for uid {}", remote.uid),
                        });
                    }
                }
            }
            batch.push((stored, restored.engine_handle));
        }
        if remote_uids.len() > state.allocator().available() {
            return Err(ClusterError::Recovery {
                reason: format!(
                    "{} stored servers exceed the {} free indices",
                    remote_uids.len(),
                    state.allocator().available()
                ),
            });
        }
        Ok(batch)
    }

    fn restore_self(
        &self,
        state: &mut ViewKeeperState,
        stored: StoredSelfRecord,
        engine_handle: EngineHandle,
    ) {
        if stored.uid != state.local.uid {
            warn!(
                stored_uid = %stored.uid,
                local_uid = %state.local.uid,
                "self record written under another uid, continuing"
            );
        }
        if let Some(cluster) = &stored.cluster_name {
            if cluster != &state.local.cluster_name {
                warn!(
                    stored = %cluster,
                    configured = %state.local.cluster_name,
                    "cluster name changed since the last run"
                );
            }
        }
        state.local.persisted_incarnation = Some(
            state
                .local
                .persisted_incarnation
                .map_or(stored.incarnation, |seen| seen.max(stored.incarnation)),
        );
        state.local.patterns = stored.patterns;
        if let Some(removed) = stored.removed_servers {
            state.removed.merge(&removed);
        }
        state.local.engine_handle = Some(engine_handle);
    }

    fn restore_remote(
        &self,
        state: &mut ViewKeeperState,
        stored: StoredRemoteRecord,
        engine_handle: EngineHandle,
        now: Timestamp,
    ) -> ClusterResult<RemoteServerHandle> {
        let handle = state.insert_record(&stored.uid, &stored.name, stored.incarnation, now)?;
        let recovered =
            RecoveryFilterState::new(stored.incarnation, FilterSequences::from_states(stored.sequences));
        let Some(record) = state.record_mut(handle) else {
            return Err(ClusterError::Recovery {
                reason: format!("record for {} vanished during restore", stored.uid),
            });
        };
        record.engine.add();
        record.engine_handle = Some(engine_handle);
        if !recovered.is_empty() {
            record.route_all = true;
            record.recovery = Some(recovered);
        }
        Ok(handle)
    }

    /// Fix the local incarnation and start normal operation.
    pub fn recovery_completed(&self, incarnation: u64) -> ClusterResult<()> {
        let now = self.now();
        let result = self.run_checked(|state, out| {
            if !state.phase.accepts_restore() {
                return Err(ClusterError::NotAvailable {
                    operation: "recovery_completed",
                    phase: state.phase.to_string(),
                });
            }
            if incarnation == 0 {
                return Err(ClusterError::InvalidArgument {
                    reason: "incarnation must be greater than zero".into(),
                });
            }
            if state.engine.is_none() {
                return Err(ClusterError::CallbacksNotRegistered { missing: "engine" });
            }
            if state.forwarding.is_none() {
                return Err(ClusterError::CallbacksNotRegistered {
                    missing: "forwarding",
                });
            }
            if let Some(persisted) = state.local.persisted_incarnation {
                if incarnation <= persisted {
                    return Err(ClusterError::IncarnationRegression {
                        current: incarnation,
                        persisted,
                    });
                }
            }

            state.local.incarnation = incarnation;
            state.local.state_change_time = now;
            state.phase = ViewPhase::Active;
            if state.local.engine_handle.is_none() {
                out.push(Callout::EngineCreateLocal(state.local.server_ref()));
            }
            // Restored servers route everything until their filters catch up.
            for record in state.records().filter(|r| r.route_all && r.recovery.is_some()) {
                out.push(Callout::EngineRouteAll {
                    server: record.server_ref(),
                    enabled: true,
                });
            }
            self.persist_self(state, out);
            info!(
                incarnation,
                pending_reconciliation = state.records().filter(|r| r.recovery.is_some()).count(),
                "recovery completed"
            );
            Ok(())
        });
        if let Err(err) = &result {
            if err.is_fatal() {
                error!(error = %err, "recovery completion failed");
            }
        }
        result
    }
}
