//! Error types for the cluster view subsystem

use crate::domain::RemoteServerHandle;
use thiserror::Error;

/// Cluster view errors
///
/// Errors raised by asynchronous membership input are logged and absorbed
/// by the view keeper. Only administrative and startup calls return them.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Invalid argument passed to an API call
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },

    /// Node tried to rejoin with an incarnation at or below its fenced value
    #[error("Fenced node {uid}: incarnation {incarnation} <= fenced {fenced}")]
    FencedNode {
        uid: String,
        incarnation: u64,
        fenced: u64,
    },

    /// Every server index up to the configured maximum is in use
    #[error("Cluster capacity exhausted: {max} servers")]
    CapacityExhausted { max: u32 },

    /// Persisted record could not be recovered
    #[error("Recovery error: {reason}")]
    Recovery { reason: String },

    /// Persisted record was written by an incompatible store version
    #[error("Store version conflict: expected {expected}, found {found}")]
    StoreVersionConflict { expected: u16, found: u16 },

    /// Persisted record belongs to a different server identity
    #[error("Store ownership conflict: record uid {record_uid}, local uid {local_uid}")]
    StoreOwnershipConflict {
        record_uid: String,
        local_uid: String,
    },

    /// New run incarnation does not advance past the persisted one
    #[error("Incarnation regression: new {current} <= persisted {persisted}")]
    IncarnationRegression { current: u64, persisted: u64 },

    /// Operation not allowed in the current registry phase
    #[error("Cluster not available: {operation} in phase {phase}")]
    NotAvailable {
        operation: &'static str,
        phase: String,
    },

    /// Engine or forwarding callbacks missing at recovery completion
    #[error("Callbacks not registered: {missing}")]
    CallbacksNotRegistered { missing: &'static str },

    /// Handle does not refer to a live remote server
    #[error("Unknown remote server: {handle}")]
    UnknownServer { handle: RemoteServerHandle },

    /// Operation targets the local server
    #[error("Operation not allowed on the local server")]
    LocalServer,

    /// The local uid appears on the cluster's removed servers list
    #[error("Local server {uid} was removed from the cluster")]
    LocalServerRemoved { uid: String },

    /// External collaborator rejected a callback
    #[error("Callback {callback} failed: {reason}")]
    Callback {
        callback: &'static str,
        reason: String,
    },
}

impl ClusterError {
    /// Fatal errors must abort startup rather than leave a partial registry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Recovery { .. }
                | Self::StoreVersionConflict { .. }
                | Self::StoreOwnershipConflict { .. }
                | Self::IncarnationRegression { .. }
                | Self::LocalServerRemoved { .. }
        )
    }
}

/// Result type for cluster view operations
pub type ClusterResult<T> = Result<T, ClusterError>;
