//! Membership event handling
//!
//! Join, leave, full view and metadata changes from the membership layer.
//! Errors caused by network input are logged and absorbed here; only
//! `LocalServerRemoved` leaves this module.

use super::callout::Callout;
use super::core::ViewKeeper;
use super::state::ViewKeeperState;
use crate::domain::{HaStatus, HealthStatus, RemoteServerHandle, RemoteServerRecord, Timestamp};
use crate::error::{ClusterError, ClusterResult};
use crate::events::{
    LeaveReason, MembershipEvent, MembershipEventKind, NodeInfo, NodeMetadata, NodeStatus,
    ViewMember, ViewTask,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

impl ViewKeeper {
    /// Single entry point for membership notifications.
    pub fn on_membership_event(&self, event: MembershipEvent) -> ClusterResult<()> {
        let now = self.now();
        self.run(|state, out| {
            if state.phase.is_terminated() {
                debug!(event = event.name(), phase = %state.phase, "event ignored");
                return Ok(());
            }
            // Metadata is ordered by its own sequence numbers and is never
            // dropped on the view version.
            let is_transition = !matches!(event.kind, MembershipEventKind::MetadataChange { .. });
            if is_transition && event.view_version < state.last_view_version {
                debug!(
                    event = event.name(),
                    version = event.view_version,
                    last = state.last_view_version,
                    "stale view version dropped"
                );
                return Ok(());
            }
            state.last_view_version = state.last_view_version.max(event.view_version);

            match event.kind {
                MembershipEventKind::ViewChange { members } => {
                    self.handle_view_change(state, out, members, now)
                }
                MembershipEventKind::NodeJoin { node, metadata } => {
                    self.handle_join(state, out, &node, metadata, now)
                }
                MembershipEventKind::NodeLeave { node, reason } => {
                    self.handle_leave(state, out, &node, reason, now);
                    Ok(())
                }
                MembershipEventKind::MetadataChange { node, metadata } => {
                    self.handle_metadata_change(state, out, &node, metadata)
                }
            }
        })
    }

    fn handle_view_change(
        &self,
        state: &mut ViewKeeperState,
        out: &mut Vec<Callout>,
        members: Vec<ViewMember>,
        now: Timestamp,
    ) -> ClusterResult<()> {
        if !state.first_view_delivered {
            state.first_view_delivered = true;
            for record in state.records_mut() {
                if record.control.added() {
                    continue;
                }
                if record.engine.added() && !record.forwarding.added() {
                    record.forwarding.add();
                    out.push(Callout::ForwardingAdd {
                        server: record.server_ref(),
                        endpoint: None,
                    });
                }
            }
        }

        let mut present = HashSet::with_capacity(members.len());
        let mut result = Ok(());
        for member in members {
            present.insert(member.node.uid.clone());
            match member.status {
                NodeStatus::Alive => {
                    let metadata = member.metadata.unwrap_or_default();
                    if let Err(err) = self.handle_join(state, out, &member.node, metadata, now) {
                        result = Err(err);
                    }
                }
                NodeStatus::Suspect => self.handle_suspect_member(state, out, &member.node, now),
                NodeStatus::Remove => {
                    self.handle_leave(state, out, &member.node, LeaveReason::Remove, now)
                }
            }
        }

        let absent: Vec<NodeInfo> = state
            .records()
            .filter(|r| r.control.connected() && !present.contains(&r.uid))
            .map(|r| NodeInfo::new(r.uid.clone(), r.incarnation))
            .collect();
        for node in absent {
            debug!(uid = %node.uid, "connected server missing from full view");
            self.handle_leave(state, out, &node, LeaveReason::Leave, now);
        }
        result
    }

    /// A suspect member with no record is registered disconnected.
    fn handle_suspect_member(
        &self,
        state: &mut ViewKeeperState,
        out: &mut Vec<Callout>,
        node: &NodeInfo,
        now: Timestamp,
    ) {
        if node.uid == state.local.uid {
            return;
        }
        if state.handle_for_uid(&node.uid).is_some() {
            self.handle_leave(state, out, node, LeaveReason::Suspect, now);
            return;
        }
        if let Err(err) = check_admission(state, node) {
            warn!(error = %err, "suspect member refused");
            return;
        }
        match self.admit(state, out, node, &node.uid, now) {
            Ok(handle) => {
                if let Some(record) = state.record_mut(handle) {
                    record.control.disconnect();
                }
            }
            Err(err) => warn!(uid = %node.uid, error = %err, "suspect member not registered"),
        }
    }

    fn handle_join(
        &self,
        state: &mut ViewKeeperState,
        out: &mut Vec<Callout>,
        node: &NodeInfo,
        metadata: NodeMetadata,
        now: Timestamp,
    ) -> ClusterResult<()> {
        if node.uid == state.local.uid {
            debug!("local server reported by membership, ignored");
            return Ok(());
        }
        if let Err(err) = check_admission(state, node) {
            warn!(error = %err, "join refused");
            return Ok(());
        }
        if let Some(info) = &metadata.server_info {
            if !info.protocol.overlaps(&self.config.protocol) {
                warn!(
                    uid = %node.uid,
                    remote_min = info.protocol.min,
                    remote_max = info.protocol.max,
                    local_min = self.config.protocol.min,
                    local_max = self.config.protocol.max,
                    "incompatible protocol version, join ignored"
                );
                return Ok(());
            }
        }

        let (handle, activated) = match state.handle_for_uid(&node.uid) {
            Some(handle) => match reactivate(state, out, handle, node, now) {
                Some(activated) => (handle, activated),
                None => return Ok(()),
            },
            None => {
                let name = metadata
                    .server_info
                    .as_ref()
                    .map_or(node.uid.as_str(), |info| info.name.as_str())
                    .to_string();
                match self.admit(state, out, node, &name, now) {
                    Ok(handle) => (handle, true),
                    Err(err) => {
                        warn!(uid = %node.uid, error = %err, "join rejected");
                        return Ok(());
                    }
                }
            }
        };
        self.apply_metadata(state, out, handle, metadata, activated)
    }

    /// Create a connected record for a first-time server.
    fn admit(
        &self,
        state: &mut ViewKeeperState,
        out: &mut Vec<Callout>,
        node: &NodeInfo,
        name: &str,
        now: Timestamp,
    ) -> ClusterResult<RemoteServerHandle> {
        let grace = self.config.deleted_node_grace_period.as_millis() as u64;
        state.sweep_tombstones(now, grace);
        let handle = state.insert_record(&node.uid, name, node.incarnation, now)?;
        let Some(record) = state.record_mut(handle) else {
            return Err(ClusterError::UnknownServer { handle });
        };
        record.control.connect();
        record.engine.add();
        record.route_all = true;
        let server = record.server_ref();
        out.push(Callout::EngineCreate(server.clone()));
        out.push(Callout::EngineRouteAll {
            server,
            enabled: true,
        });
        info!(
            uid = %node.uid,
            index = handle.index(),
            incarnation = node.incarnation,
            "remote server added"
        );
        Ok(handle)
    }

    pub(super) fn handle_leave(
        &self,
        state: &mut ViewKeeperState,
        out: &mut Vec<Callout>,
        node: &NodeInfo,
        reason: LeaveReason,
        now: Timestamp,
    ) {
        if node.uid == state.local.uid {
            return;
        }
        if state.removed.is_fenced(&node.uid, node.incarnation) {
            debug!(uid = %node.uid, "leave from fenced server ignored");
            return;
        }

        if let Some(handle) = state.handle_for_uid(&node.uid) {
            let Some(record) = state.record_mut(handle) else {
                return;
            };
            if node.incarnation < record.incarnation {
                debug!(
                    uid = %node.uid,
                    incarnation = node.incarnation,
                    current = record.incarnation,
                    "leave for older incarnation ignored"
                );
                return;
            }
            let active =
                record.control.connected() || record.engine.connected() || record.forwarding.connected();
            if active {
                disconnect_record(record, out, now);
                info!(uid = %node.uid, index = handle.index(), ?reason, "remote server left");
            }
        } else if reason != LeaveReason::Remove {
            debug!(uid = %node.uid, "leave for unknown server ignored");
            return;
        }

        if reason == LeaveReason::Remove {
            if state.removed.insert(&node.uid, node.incarnation) {
                self.publish_removed_servers(state, out);
            }
            if state.handle_for_uid(&node.uid).is_some() {
                state
                    .pending_tasks
                    .push(ViewTask::DeleteRemovedServers(vec![(
                        node.uid.clone(),
                        node.incarnation,
                    )]));
            }
        }
    }

    fn handle_metadata_change(
        &self,
        state: &mut ViewKeeperState,
        out: &mut Vec<Callout>,
        node: &NodeInfo,
        metadata: NodeMetadata,
    ) -> ClusterResult<()> {
        let Some(handle) = state.handle_for_uid(&node.uid) else {
            debug!(uid = %node.uid, "metadata for unknown server ignored");
            return Ok(());
        };
        let current = state.record(handle).map(|r| (r.incarnation, r.control.connected()));
        match current {
            Some((incarnation, true)) if incarnation == node.incarnation => {
                self.apply_metadata(state, out, handle, metadata, false)
            }
            _ => {
                debug!(
                    uid = %node.uid,
                    incarnation = node.incarnation,
                    "metadata for inactive or other incarnation ignored"
                );
                Ok(())
            }
        }
    }

    /// Apply attributes carried by a join or metadata change.
    ///
    /// Order: forwarding endpoint, filters, subscriptions, monitoring,
    /// removed servers, then reconciliation.
    fn apply_metadata(
        &self,
        state: &mut ViewKeeperState,
        out: &mut Vec<Callout>,
        handle: RemoteServerHandle,
        metadata: NodeMetadata,
        is_join: bool,
    ) -> ClusterResult<()> {
        let mut tasks = Vec::new();
        let removed_update;
        {
            let Some(record) = state.record_mut(handle) else {
                return Ok(());
            };
            if let Some(info) = &metadata.server_info {
                if info.name != record.name {
                    debug!(uid = %record.uid, old = %record.name, new = %info.name, "server renamed");
                    record.name = info.name.clone();
                }
            }

            apply_forwarding(record, metadata.forwarding, out);
            self.apply_filters(record, metadata.filters, out, &mut tasks);
            apply_subscriptions(
                record,
                metadata.subscriptions_added,
                metadata.subscriptions_removed,
                out,
            );

            match metadata.monitoring {
                Some(status) if status.sqn > record.monitoring_sqn => {
                    record.monitoring_sqn = status.sqn;
                    record.health = status.health;
                    record.ha = status.ha;
                }
                Some(_) => {}
                None if is_join => {
                    record.health = HealthStatus::Unknown;
                    record.ha = HaStatus::Unknown;
                }
                None => {}
            }

            removed_update = match metadata.removed_servers {
                Some(update) if update.sqn > record.removed_servers_sqn => {
                    record.removed_servers_sqn = update.sqn;
                    Some(update.servers)
                }
                _ => None,
            };

            if record.try_reconcile() {
                info!(uid = %record.uid, "filter state reconciled, route-all cleared");
                out.push(Callout::EngineRouteAll {
                    server: record.server_ref(),
                    enabled: false,
                });
            }
        }
        state.pending_tasks.extend(tasks);

        match removed_update {
            Some(servers) => self.merge_removed_servers(state, out, &servers),
            None => Ok(()),
        }
    }

    /// Merge a peer's removed servers list into the local fencing set.
    fn merge_removed_servers(
        &self,
        state: &mut ViewKeeperState,
        out: &mut Vec<Callout>,
        servers: &crate::domain::RemovedServers,
    ) -> ClusterResult<()> {
        let changes = state.removed.merge(servers);
        if changes.is_empty() {
            return Ok(());
        }
        debug!(changed = changes.len(), "removed servers list merged");

        let to_delete: Vec<(String, u64)> = changes
            .iter()
            .filter(|(uid, incarnation)| {
                state
                    .handle_for_uid(uid)
                    .and_then(|handle| state.record(handle))
                    .is_some_and(|record| record.incarnation <= *incarnation)
            })
            .cloned()
            .collect();
        if !to_delete.is_empty() {
            state
                .pending_tasks
                .push(ViewTask::DeleteRemovedServers(to_delete));
        }
        self.publish_removed_servers(state, out);

        let local_uid = state.local.uid.clone();
        if state.local.incarnation > 0 && state.removed.is_fenced(&local_uid, state.local.incarnation) {
            warn!(uid = %local_uid, "local server appears on the removed servers list");
            return Err(ClusterError::LocalServerRemoved { uid: local_uid });
        }
        Ok(())
    }

    /// Persist the fencing set with the self-record and queue its publication.
    pub(super) fn publish_removed_servers(&self, state: &mut ViewKeeperState, out: &mut Vec<Callout>) {
        self.persist_self(state, out);
        state
            .pending_tasks
            .push(ViewTask::PublishRemovedServers(state.removed.clone()));
    }
}

/// Refuse a node whose incarnation is fenced.
fn check_admission(state: &ViewKeeperState, node: &NodeInfo) -> ClusterResult<()> {
    match state.removed.fenced_incarnation(&node.uid) {
        Some(fenced) if node.incarnation <= fenced => Err(ClusterError::FencedNode {
            uid: node.uid.clone(),
            incarnation: node.incarnation,
            fenced,
        }),
        _ => Ok(()),
    }
}

/// Bring an existing record back for a join.
///
/// Returns `None` when the join is for an older incarnation, otherwise
/// whether the record was (re)activated rather than already connected.
fn reactivate(
    state: &mut ViewKeeperState,
    out: &mut Vec<Callout>,
    handle: RemoteServerHandle,
    node: &NodeInfo,
    now: Timestamp,
) -> Option<bool> {
    let record = state.record_mut(handle)?;
    if node.incarnation < record.incarnation {
        debug!(
            uid = %node.uid,
            incarnation = node.incarnation,
            current = record.incarnation,
            "join for older incarnation ignored"
        );
        return None;
    }
    if node.incarnation == record.incarnation && record.control.connected() {
        return Some(false);
    }

    let server = record.server_ref();
    if record.engine.connected() {
        record.engine.disconnect();
        out.push(Callout::EngineDisconnected(server.clone()));
    }
    if record.forwarding.connected() {
        record.forwarding.disconnect();
        out.push(Callout::ForwardingDisconnect(server.clone()));
    }
    if !record.engine.added() {
        record.engine.add();
        out.push(Callout::EngineCreate(server.clone()));
    }
    if node.incarnation > record.incarnation {
        info!(
            uid = %node.uid,
            previous = record.incarnation,
            incarnation = node.incarnation,
            "remote server restarted"
        );
        record.reset_for_incarnation(node.incarnation);
        if !record.route_all {
            record.route_all = true;
            out.push(Callout::EngineRouteAll {
                server,
                enabled: true,
            });
        }
    }
    record.control.connect();
    record.endpoint = None;
    record.touch(now);
    info!(uid = %node.uid, index = handle.index(), "remote server rejoined");
    Some(true)
}

fn disconnect_record(record: &mut RemoteServerRecord, out: &mut Vec<Callout>, now: Timestamp) {
    record.control.disconnect();
    record.endpoint = None;
    record.touch(now);
    let server = record.server_ref();
    if record.engine.connected() {
        record.engine.disconnect();
        out.push(Callout::EngineDisconnected(server.clone()));
    }
    if record.forwarding.added() {
        record.forwarding.disconnect();
        out.push(Callout::ForwardingDisconnect(server));
    }
}

fn apply_forwarding(
    record: &mut RemoteServerRecord,
    endpoint: Option<crate::domain::ForwardingEndpoint>,
    out: &mut Vec<Callout>,
) {
    if !record.forwarding.added() {
        record.forwarding.add();
        record.endpoint = endpoint.clone();
        out.push(Callout::ForwardingAdd {
            server: record.server_ref(),
            endpoint,
        });
        return;
    }
    if let Some(endpoint) = endpoint {
        if record.endpoint.as_ref() != Some(&endpoint) {
            record.endpoint = Some(endpoint.clone());
            out.push(Callout::ForwardingConnect {
                server: record.server_ref(),
                endpoint,
            });
        }
    }
}

fn apply_subscriptions(
    record: &RemoteServerRecord,
    added: Vec<String>,
    removed: Vec<String>,
    out: &mut Vec<Callout>,
) {
    if !added.is_empty() {
        out.push(Callout::EngineAddSubscriptions {
            server: record.server_ref(),
            patterns: added,
        });
    }
    if !removed.is_empty() {
        out.push(Callout::EngineRemoveSubscriptions {
            server: record.server_ref(),
            patterns: removed,
        });
    }
}
