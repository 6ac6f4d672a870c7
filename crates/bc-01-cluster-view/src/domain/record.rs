//! Remote server record
//!
//! One record per known remote server, owned by the view keeper.
//!
//! ```text
//! Unknown ──join──→ Connected ──leave──→ Disconnected ──join──→ Connected
//!                       │                      │
//!                       └──────admin delete────┴──→ Removed (terminal)
//! ```

use super::entities::{
    EngineHandle, ForwardingEndpoint, HaStatus, HealthStatus, RemoteServerHandle,
    RemoteServerState, ServerRef, Timestamp,
};
use super::filter_sequence::FilterSequences;
use super::recovery::RecoveryFilterState;

/// Awareness and reachability of a server in one subsystem.
///
/// `connected` implies `added`; the methods keep it that way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Presence {
    added: bool,
    connected: bool,
}

impl Presence {
    pub fn added(&self) -> bool {
        self.added
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn add(&mut self) {
        self.added = true;
    }

    pub fn connect(&mut self) {
        self.added = true;
        self.connected = true;
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Per-node entity tracked by the view keeper.
#[derive(Debug, Clone)]
pub struct RemoteServerRecord {
    pub handle: RemoteServerHandle,
    pub name: String,
    pub uid: String,
    pub incarnation: u64,
    pub engine_handle: Option<EngineHandle>,
    /// Membership layer
    pub control: Presence,
    pub engine: Presence,
    pub forwarding: Presence,
    pub route_all: bool,
    pub endpoint: Option<ForwardingEndpoint>,
    pub sequences: FilterSequences,
    pub recovery: Option<RecoveryFilterState>,
    pub health: HealthStatus,
    pub ha: HaStatus,
    pub monitoring_sqn: u64,
    pub removed_servers_sqn: u64,
    pub connectivity_change_time: Timestamp,
}

impl RemoteServerRecord {
    pub fn new(
        handle: RemoteServerHandle,
        uid: impl Into<String>,
        name: impl Into<String>,
        incarnation: u64,
        now: Timestamp,
    ) -> Self {
        Self {
            handle,
            name: name.into(),
            uid: uid.into(),
            incarnation,
            engine_handle: None,
            control: Presence::default(),
            engine: Presence::default(),
            forwarding: Presence::default(),
            route_all: false,
            endpoint: None,
            sequences: FilterSequences::new(),
            recovery: None,
            health: HealthStatus::Unknown,
            ha: HaStatus::Unknown,
            monitoring_sqn: 0,
            removed_servers_sqn: 0,
            connectivity_change_time: now,
        }
    }

    pub fn server_ref(&self) -> ServerRef {
        ServerRef {
            handle: self.handle,
            name: self.name.clone(),
            uid: self.uid.clone(),
        }
    }

    /// Record a connectivity transition; the change time never moves backwards.
    pub fn touch(&mut self, now: Timestamp) {
        self.connectivity_change_time = self.connectivity_change_time.max(now);
    }

    /// Fully connected means reachable on both control and forwarding.
    pub fn is_connected(&self) -> bool {
        self.control.connected() && self.forwarding.connected()
    }

    pub fn view_state(&self) -> RemoteServerState {
        if !self.control.connected() {
            RemoteServerState::Inactive
        } else if self.forwarding.connected() {
            RemoteServerState::Active
        } else {
            RemoteServerState::Connecting
        }
    }

    /// Restored from the store but not yet reported by the membership layer.
    pub fn is_restored_not_in_view(&self) -> bool {
        !self.control.added()
    }

    /// Forget everything learned from the previous incarnation.
    pub fn reset_for_incarnation(&mut self, incarnation: u64) {
        self.incarnation = incarnation;
        self.sequences.reset();
        self.monitoring_sqn = 0;
        self.removed_servers_sqn = 0;
    }

    /// Clear `route_all` once live filter state is trustworthy.
    ///
    /// Returns `true` if `route_all` was cleared by this call. Records with a
    /// recovery state reconcile against it; records without one only need a
    /// live base for any filter kind.
    pub fn try_reconcile(&mut self) -> bool {
        if !self.route_all {
            self.recovery = None;
            return false;
        }
        let reconciled = match &self.recovery {
            Some(recovered) => recovered.is_reconciled(self.incarnation, &self.sequences),
            None => self.sequences.has_any_base(),
        };
        if reconciled {
            self.route_all = false;
            self.recovery = None;
        }
        reconciled
    }
}
