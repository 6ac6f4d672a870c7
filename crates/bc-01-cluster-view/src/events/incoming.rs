//! Incoming membership events
//!
//! The membership layer decodes gossip attributes into `NodeMetadata`; the
//! view keeper only sees typed values and opaque filter payloads.

use crate::domain::{
    FilterUpdate, ForwardingEndpoint, MonitoringStatus, RemovedServers, ServerInfo,
};

/// Identity of a node as reported by the membership layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    pub uid: String,
    pub incarnation: u64,
}

impl NodeInfo {
    pub fn new(uid: impl Into<String>, incarnation: u64) -> Self {
        Self {
            uid: uid.into(),
            incarnation,
        }
    }
}

/// Status of a member inside a full view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    Alive,
    /// Failure suspected; attributes are retained
    Suspect,
    /// Removed from the cluster
    Remove,
}

/// Why a node left the view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaveReason {
    Leave,
    Suspect,
    /// Permanently removed; the node is fenced
    Remove,
}

/// Removed servers list published by a peer, versioned by the publisher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovedServersUpdate {
    pub sqn: u64,
    pub servers: RemovedServers,
}

/// Attributes carried by a join or metadata change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeMetadata {
    pub server_info: Option<ServerInfo>,
    pub forwarding: Option<ForwardingEndpoint>,
    /// Covering filter items, in any order
    pub filters: Vec<FilterUpdate>,
    /// Retained wildcard subscription deltas
    pub subscriptions_added: Vec<String>,
    pub subscriptions_removed: Vec<String>,
    pub monitoring: Option<MonitoringStatus>,
    pub removed_servers: Option<RemovedServersUpdate>,
}

impl NodeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_server_info(mut self, info: ServerInfo) -> Self {
        self.server_info = Some(info);
        self
    }

    #[must_use]
    pub fn with_forwarding(mut self, endpoint: ForwardingEndpoint) -> Self {
        self.forwarding = Some(endpoint);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, item: FilterUpdate) -> Self {
        self.filters.push(item);
        self
    }

    #[must_use]
    pub fn with_subscriptions_added(mut self, patterns: Vec<String>) -> Self {
        self.subscriptions_added = patterns;
        self
    }

    #[must_use]
    pub fn with_subscriptions_removed(mut self, patterns: Vec<String>) -> Self {
        self.subscriptions_removed = patterns;
        self
    }

    #[must_use]
    pub fn with_monitoring(mut self, status: MonitoringStatus) -> Self {
        self.monitoring = Some(status);
        self
    }

    #[must_use]
    pub fn with_removed_servers(mut self, sqn: u64, servers: RemovedServers) -> Self {
        self.removed_servers = Some(RemovedServersUpdate { sqn, servers });
        self
    }
}

/// One member of a full view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewMember {
    pub node: NodeInfo,
    pub status: NodeStatus,
    pub metadata: Option<NodeMetadata>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MembershipEventKind {
    /// Full view, delivered first after subscription and on resync
    ViewChange { members: Vec<ViewMember> },
    NodeJoin { node: NodeInfo, metadata: NodeMetadata },
    NodeLeave { node: NodeInfo, reason: LeaveReason },
    MetadataChange { node: NodeInfo, metadata: NodeMetadata },
}

/// Membership notification stamped with the view version it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MembershipEvent {
    pub view_version: u64,
    pub kind: MembershipEventKind,
}

impl MembershipEvent {
    pub fn view_change(view_version: u64, members: Vec<ViewMember>) -> Self {
        Self {
            view_version,
            kind: MembershipEventKind::ViewChange { members },
        }
    }

    pub fn join(view_version: u64, node: NodeInfo, metadata: NodeMetadata) -> Self {
        Self {
            view_version,
            kind: MembershipEventKind::NodeJoin { node, metadata },
        }
    }

    pub fn leave(view_version: u64, node: NodeInfo, reason: LeaveReason) -> Self {
        Self {
            view_version,
            kind: MembershipEventKind::NodeLeave { node, reason },
        }
    }

    pub fn metadata_change(view_version: u64, node: NodeInfo, metadata: NodeMetadata) -> Self {
        Self {
            view_version,
            kind: MembershipEventKind::MetadataChange { node, metadata },
        }
    }

    pub fn node(&self) -> Option<&NodeInfo> {
        match &self.kind {
            MembershipEventKind::ViewChange { .. } => None,
            MembershipEventKind::NodeJoin { node, .. }
            | MembershipEventKind::NodeLeave { node, .. }
            | MembershipEventKind::MetadataChange { node, .. } => Some(node),
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            MembershipEventKind::ViewChange { .. } => "view-change",
            MembershipEventKind::NodeJoin { .. } => "node-join",
            MembershipEventKind::NodeLeave { .. } => "node-leave",
            MembershipEventKind::MetadataChange { .. } => "metadata-change",
        }
    }
}
