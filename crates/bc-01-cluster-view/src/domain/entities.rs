//! Core identifiers and value types shared across the cluster view.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense, reusable index of a remote server.
pub type ServerIndex = u32;

/// Milliseconds since an arbitrary epoch supplied by the `TimeSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier` (saturating at 0).
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn add_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

/// Generation-checked handle to a remote server record.
///
/// The generation is bumped every time a slot is retired, so a handle kept
/// across a deletion no longer resolves, even after the index is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteServerHandle {
    index: ServerIndex,
    generation: u32,
}

impl RemoteServerHandle {
    /// Index reserved for the local server; never handed out by the allocator.
    pub const LOCAL_INDEX: ServerIndex = ServerIndex::MAX;

    pub fn new(index: ServerIndex, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Handle reported for the local server in views.
    pub fn local() -> Self {
        Self::new(Self::LOCAL_INDEX, 0)
    }

    pub fn index(&self) -> ServerIndex {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_local(&self) -> bool {
        self.index == Self::LOCAL_INDEX
    }
}

impl fmt::Display for RemoteServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local() {
            write!(f, "local")
        } else {
            write!(f, "{}#{}", self.index, self.generation)
        }
    }
}

/// Opaque handle issued by the engine for a remote server's store entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineHandle(pub u64);

/// Opaque handle for an uncommitted engine store update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingUpdate(pub u64);

/// Identity passed along with every engine and forwarding callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRef {
    pub handle: RemoteServerHandle,
    pub name: String,
    pub uid: String,
}

/// Data-forwarding endpoint advertised by a remote server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingEndpoint {
    pub address: String,
    pub port: u16,
    pub tls: bool,
}

/// Remote server state as reported in views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RemoteServerState {
    Active = 100,
    Connecting = 101,
    Inactive = 102,
}

/// Health status advertised through monitoring metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum HealthStatus {
    #[default]
    Unknown = 0,
    Green = 1,
    Yellow = 2,
    Red = 3,
}

/// High-availability role advertised through monitoring metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum HaStatus {
    #[default]
    Unknown = 0,
    Disabled = 1,
    PrimarySingle = 2,
    PrimaryPair = 3,
    Standby = 4,
    Error = 9,
}

/// Monitoring attribute carried in node metadata. Applied only when `sqn`
/// advances past the last applied value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoringStatus {
    pub sqn: u64,
    pub health: HealthStatus,
    pub ha: HaStatus,
}

/// Inclusive range of cluster protocol versions a server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersionRange {
    pub min: u16,
    pub max: u16,
}

impl ProtocolVersionRange {
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn overlaps(&self, other: &ProtocolVersionRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

impl Default for ProtocolVersionRange {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Server description attribute published by every node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub protocol: ProtocolVersionRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_arithmetic() {
        let ts = Timestamp::new(1_000);
        assert_eq!(ts.add_millis(500).as_millis(), 1_500);
        assert_eq!(ts.millis_since(Timestamp::new(400)), 600);
        assert_eq!(Timestamp::new(10).millis_since(ts), 0);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(RemoteServerHandle::new(3, 7).to_string(), "3#7");
        assert_eq!(RemoteServerHandle::local().to_string(), "local");
    }

    #[test]
    fn test_protocol_overlap() {
        let local = ProtocolVersionRange::new(2, 4);
        assert!(local.overlaps(&ProtocolVersionRange::new(4, 6)));
        assert!(local.overlaps(&ProtocolVersionRange::new(1, 2)));
        assert!(!local.overlaps(&ProtocolVersionRange::new(5, 9)));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(RemoteServerState::Connecting as u16, 101);
        assert_eq!(HaStatus::Error as u8, 9);
        assert_eq!(HealthStatus::default(), HealthStatus::Unknown);
    }
}
