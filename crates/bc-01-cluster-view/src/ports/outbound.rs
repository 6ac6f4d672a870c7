//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the host must implement: the broker engine, the forwarding
//! layer's control surface, a clock and the persisted record codec.
//!
//! Callbacks are invoked with the registry borrow released, so an
//! implementation may call back into the `ViewKeeper` on the same thread.

use crate::domain::{
    EngineHandle, FilterKind, ForwardingEndpoint, PendingUpdate, ServerRef, StoredRecord,
    Timestamp,
};
use crate::error::ClusterResult;
use thiserror::Error;

/// Failure reported by an engine or forwarding callback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallbackError {
    /// The collaborator is shutting down; the call is ignored
    #[error("closed")]
    Closed,

    #[error("{reason}")]
    Failed { reason: String },
}

pub type CallbackResult<T> = Result<T, CallbackError>;

/// Cumulative forwarding statistics reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatistics {
    /// Forwarded messages received, excluding retained
    pub forwarded_in: u64,
    /// Forwarded messages received with no local consumer
    pub forwarded_in_no_consumer: u64,
    /// Forwarded retained messages received
    pub forwarded_in_retained: u64,
}

/// Broker engine callbacks.
///
/// Must be registered before `recovery_completed`.
pub trait EngineCallbacks: Send + Sync {
    /// First-time registration of a remote server.
    fn create(&self, server: &ServerRef) -> CallbackResult<EngineHandle>;

    /// Store entry for the local server's self-record.
    fn create_local(&self, server: &ServerRef) -> CallbackResult<EngineHandle>;

    fn connected(&self, engine: EngineHandle, server: &ServerRef) -> CallbackResult<()>;

    fn disconnected(&self, engine: EngineHandle, server: &ServerRef) -> CallbackResult<()>;

    fn remove(&self, engine: EngineHandle, server: &ServerRef) -> CallbackResult<()>;

    /// Treat the server as a destination for every publication.
    fn route_all(&self, engine: EngineHandle, server: &ServerRef, enabled: bool)
        -> CallbackResult<()>;

    /// Replace the covering filter of `kind` with a full snapshot.
    fn replace_filter(
        &self,
        engine: EngineHandle,
        server: &ServerRef,
        kind: FilterKind,
        sqn: u64,
        payload: &[u8],
    ) -> CallbackResult<()>;

    /// Apply a contiguous delta to the covering filter of `kind`.
    fn apply_filter_update(
        &self,
        engine: EngineHandle,
        server: &ServerRef,
        kind: FilterKind,
        sqn: u64,
        payload: &[u8],
    ) -> CallbackResult<()>;

    fn add_subscriptions(
        &self,
        engine: EngineHandle,
        server: &ServerRef,
        patterns: &[String],
    ) -> CallbackResult<()>;

    fn remove_subscriptions(
        &self,
        engine: EngineHandle,
        server: &ServerRef,
        patterns: &[String],
    ) -> CallbackResult<()>;

    /// Persist opaque per-server data. `commit == false` batches the write
    /// with the next committed update.
    fn update(&self, engine: EngineHandle, data: &[u8], commit: bool)
        -> CallbackResult<PendingUpdate>;

    /// Pull cumulative forwarding statistics.
    fn report_statistics(&self) -> CallbackResult<EngineStatistics>;

    fn term(&self) -> CallbackResult<()>;
}

/// Forwarding layer control surface.
pub trait ForwardingControl: Send + Sync {
    /// Make the forwarding layer aware of a server; the endpoint may still be unknown.
    fn add(&self, server: &ServerRef, endpoint: Option<&ForwardingEndpoint>) -> CallbackResult<()>;

    fn connect(&self, server: &ServerRef, endpoint: &ForwardingEndpoint) -> CallbackResult<()>;

    fn disconnect(&self, server: &ServerRef) -> CallbackResult<()>;

    fn remove(&self, server: &ServerRef) -> CallbackResult<()>;

    fn term(&self) -> CallbackResult<()>;
}

/// Abstract interface for time-related operations.
///
/// Production uses the system clock; tests inject a controllable one.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// System clock in milliseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Timestamp::new(millis)
    }
}

/// Encoding of persisted self and remote records.
pub trait RecordCodec: Send + Sync {
    fn encode(&self, record: &StoredRecord) -> ClusterResult<Vec<u8>>;

    /// Decode a record, rejecting unknown layout versions.
    fn decode(&self, data: &[u8]) -> ClusterResult<StoredRecord>;
}
