//! Events module for the cluster view
//!
//! Incoming events are produced by the membership layer; outgoing tasks are
//! queued by the view keeper for the control manager to execute.

pub mod incoming;
pub mod outgoing;

pub use incoming::{
    LeaveReason, MembershipEvent, MembershipEventKind, NodeInfo, NodeMetadata, NodeStatus,
    RemovedServersUpdate, ViewMember,
};
pub use outgoing::ViewTask;
