//! Domain layer for the cluster view
//!
//! Pure bookkeeping with no callbacks or locking: the index allocator, the
//! remote server record, the fencing set and filter sequence tracking.

pub mod entities;
pub mod filter_sequence;
pub mod record;
pub mod recovery;
pub mod removed_servers;
pub mod server_index;
pub mod stored;

pub use entities::{
    EngineHandle, ForwardingEndpoint, HaStatus, HealthStatus, MonitoringStatus, PendingUpdate,
    ProtocolVersionRange, RemoteServerHandle, RemoteServerState, ServerIndex, ServerInfo,
    ServerRef, Timestamp,
};
pub use filter_sequence::{
    order_batch, FilterKind, FilterPayloadKind, FilterSequences, FilterUpdate, SequenceDecision,
    SequenceState,
};
pub use record::{Presence, RemoteServerRecord};
pub use recovery::RecoveryFilterState;
pub use removed_servers::RemovedServers;
pub use server_index::ServerIndexAllocator;
pub use stored::{StoredRecord, StoredRemoteRecord, StoredSelfRecord, STORE_VERSION};
