//! Removed servers fencing set
//!
//! Permanently evicted server identities with the highest incarnation seen
//! at eviction. A uid may only rejoin with a strictly greater incarnation.
//! Merging is a per-uid maximum, so it is commutative and idempotent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted, mergeable set of `(uid, incarnation)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedServers {
    entries: BTreeMap<String, u64>,
}

impl RemovedServers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a removal. Returns `true` if the set changed.
    pub fn insert(&mut self, uid: &str, incarnation: u64) -> bool {
        match self.entries.get_mut(uid) {
            Some(fenced) if *fenced >= incarnation => false,
            Some(fenced) => {
                *fenced = incarnation;
                true
            }
            None => {
                self.entries.insert(uid.to_string(), incarnation);
                true
            }
        }
    }

    /// Fenced incarnation for `uid`, if any.
    pub fn fenced_incarnation(&self, uid: &str) -> Option<u64> {
        self.entries.get(uid).copied()
    }

    /// Whether `(uid, incarnation)` must be refused admission.
    pub fn is_fenced(&self, uid: &str, incarnation: u64) -> bool {
        self.fenced_incarnation(uid)
            .is_some_and(|fenced| incarnation <= fenced)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.entries.contains_key(uid)
    }

    /// Union with `other`, keeping the maximum incarnation per uid.
    ///
    /// Returns the entries that were added or raised by the merge.
    pub fn merge(&mut self, other: &RemovedServers) -> Vec<(String, u64)> {
        other
            .iter()
            .filter(|(uid, incarnation)| self.insert(uid, *incarnation))
            .map(|(uid, incarnation)| (uid.to_string(), incarnation))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(uid, inc)| (uid.as_str(), *inc))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, u64)> for RemovedServers {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut set = RemovedServers::new();
        for (uid, incarnation) in iter {
            set.insert(&uid, incarnation);
        }
        set
    }
}
