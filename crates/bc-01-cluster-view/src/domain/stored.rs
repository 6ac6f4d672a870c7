//! Persisted record layout
//!
//! ```text
//! self record   = { version, Local,  uid, incarnation, patterns, removed servers, cluster name }
//! remote record = { version, Remote, uid, name, incarnation, 4 x (base_sqn, last_update_sqn) }
//! ```
//!
//! The version tag is written ahead of the record so that a reader can
//! refuse a layout it does not understand before decoding it.

use super::filter_sequence::SequenceState;
use super::removed_servers::RemovedServers;
use serde::{Deserialize, Serialize};

/// Current persisted layout version.
pub const STORE_VERSION: u16 = 1;

/// Self record: what the local server needs to rejoin after restart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSelfRecord {
    pub uid: String,
    pub incarnation: u64,
    pub patterns: Vec<String>,
    pub removed_servers: Option<RemovedServers>,
    pub cluster_name: Option<String>,
}

/// Remote record: filter positions to reconcile against after restart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRemoteRecord {
    pub uid: String,
    pub name: String,
    pub incarnation: u64,
    pub sequences: [SequenceState; 4],
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredRecord {
    Local(StoredSelfRecord),
    Remote(StoredRemoteRecord),
}
