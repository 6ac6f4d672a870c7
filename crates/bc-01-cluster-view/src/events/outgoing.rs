//! Tasks queued by the view keeper
//!
//! The view keeper never talks to the membership layer directly. Work that
//! needs it is queued here and drained by the control manager with
//! `ViewKeeper::take_pending_tasks`.

use crate::domain::{FilterKind, RemovedServers};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewTask {
    /// The local removed servers list changed and should be gossiped
    PublishRemovedServers(RemovedServers),
    /// Peers fenced these live servers; delete them locally
    DeleteRemovedServers(Vec<(String, u64)>),
    /// A filter update gap was seen; ask the publisher for a new base
    RequestFreshBase { uid: String, kind: FilterKind },
    /// A server was deleted; drop its retained attributes from the membership layer
    ClearRetainedAttributes { uid: String, incarnation: u64 },
}
