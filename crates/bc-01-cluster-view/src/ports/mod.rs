//! Ports module for the cluster view

pub mod inbound;
pub mod outbound;

pub use inbound::{
    ClusterStatistics, ClusterView, ClusterViewApi, RestoredMapping, RestoredRecord, ServerView,
};
pub use outbound::{
    CallbackError, CallbackResult, EngineCallbacks, EngineStatistics, ForwardingControl,
    RecordCodec, SystemTimeSource, TimeSource,
};
