//! Covering-filter sequence tracking
//!
//! Each remote server publishes four kinds of covering filter. For every
//! kind the view keeps `(base_sqn, last_update_sqn)`:
//!
//! ```text
//! base(sqn)            ──→ base = last = sqn            (replace base)
//! update(last + 1)     ──→ last = sqn                   (apply update)
//! update(<= last)      ──→ dropped                      (stale duplicate)
//! update(> last + 1)   ──→ dropped, fresh base wanted   (gap)
//! ```
//!
//! Covering filter deltas are not commutative, so an update is never applied
//! out of order or before its base. Sequence number 0 means "nothing received".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of covering filter a remote server publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    /// Bloom filter over exact topic subscriptions
    ExactBloom,
    /// Bloom filter over wildcard subscription prefixes
    WildcardBloom,
    /// Explicit set of wildcard subscription patterns
    WildcardPatterns,
    /// Recursive covering filter
    RecursiveCovering,
}

impl FilterKind {
    pub const ALL: [FilterKind; 4] = [
        FilterKind::ExactBloom,
        FilterKind::WildcardBloom,
        FilterKind::WildcardPatterns,
        FilterKind::RecursiveCovering,
    ];

    fn slot(self) -> usize {
        match self {
            FilterKind::ExactBloom => 0,
            FilterKind::WildcardBloom => 1,
            FilterKind::WildcardPatterns => 2,
            FilterKind::RecursiveCovering => 3,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::ExactBloom => write!(f, "exact-bloom"),
            FilterKind::WildcardBloom => write!(f, "wildcard-bloom"),
            FilterKind::WildcardPatterns => write!(f, "wildcard-patterns"),
            FilterKind::RecursiveCovering => write!(f, "recursive-covering"),
        }
    }
}

/// Whether a filter payload is a full snapshot or a delta.
///
/// `Base` orders before `Update` so a base and an update carrying the same
/// sqn sort base-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterPayloadKind {
    Base,
    Update,
}

/// One covering-filter item carried in node metadata.
///
/// The payload is opaque to the view keeper; it is produced and consumed
/// by the filter codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterUpdate {
    pub kind: FilterKind,
    pub payload_kind: FilterPayloadKind,
    pub sqn: u64,
    pub payload: Vec<u8>,
}

impl FilterUpdate {
    pub fn base(kind: FilterKind, sqn: u64, payload: Vec<u8>) -> Self {
        Self {
            kind,
            payload_kind: FilterPayloadKind::Base,
            sqn,
            payload,
        }
    }

    pub fn update(kind: FilterKind, sqn: u64, payload: Vec<u8>) -> Self {
        Self {
            kind,
            payload_kind: FilterPayloadKind::Update,
            sqn,
            payload,
        }
    }

    pub fn is_base(&self) -> bool {
        self.payload_kind == FilterPayloadKind::Base
    }
}

/// Sequence position for one filter kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceState {
    pub base_sqn: u64,
    pub last_update_sqn: u64,
}

impl SequenceState {
    pub fn new(base_sqn: u64, last_update_sqn: u64) -> Self {
        Self {
            base_sqn,
            last_update_sqn,
        }
    }

    pub fn has_base(&self) -> bool {
        self.base_sqn > 0
    }

    pub fn is_empty(&self) -> bool {
        self.base_sqn == 0 && self.last_update_sqn == 0
    }
}

/// Outcome of offering one filter item to a `SequenceState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceDecision {
    /// Base accepted; deliver "replace base"
    ReplaceBase,
    /// Contiguous update accepted; deliver "apply update"
    ApplyUpdate,
    /// Already applied (or zero sqn); drop silently
    Stale,
    /// Missing prerequisite; drop and request a fresh base
    Gap { expected: u64 },
}

/// Sequence state for all four filter kinds of one remote server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSequences {
    states: [SequenceState; 4],
}

impl FilterSequences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_states(states: [SequenceState; 4]) -> Self {
        Self { states }
    }

    pub fn get(&self, kind: FilterKind) -> SequenceState {
        self.states[kind.slot()]
    }

    pub fn states(&self) -> [SequenceState; 4] {
        self.states
    }

    /// Offer an item and advance the state if it is accepted.
    pub fn offer(&mut self, item: &FilterUpdate) -> SequenceDecision {
        let state = &mut self.states[item.kind.slot()];
        if item.sqn == 0 {
            return SequenceDecision::Stale;
        }
        match item.payload_kind {
            FilterPayloadKind::Base => {
                state.base_sqn = item.sqn;
                state.last_update_sqn = item.sqn;
                SequenceDecision::ReplaceBase
            }
            FilterPayloadKind::Update => {
                // Nothing can follow the largest sequence number.
                let Some(expected) = state.last_update_sqn.checked_add(1) else {
                    return SequenceDecision::Stale;
                };
                if !state.has_base() {
                    return SequenceDecision::Gap { expected };
                }
                if item.sqn == expected {
                    state.last_update_sqn = item.sqn;
                    SequenceDecision::ApplyUpdate
                } else if item.sqn < expected {
                    SequenceDecision::Stale
                } else {
                    SequenceDecision::Gap { expected }
                }
            }
        }
    }

    pub fn has_any_base(&self) -> bool {
        self.states.iter().any(SequenceState::has_base)
    }

    /// Forget everything; used when a node restarts with a new incarnation.
    pub fn reset(&mut self) {
        self.states = Default::default();
    }
}

/// Order a batch of filter items for application.
///
/// Items are sorted by `(kind, sqn)`, base before update on equal sqn. Within
/// each kind anything older than the newest base in the batch is discarded,
/// since that base supersedes it.
pub fn order_batch(mut items: Vec<FilterUpdate>) -> Vec<FilterUpdate> {
    items.sort_by(|a, b| {
        (a.kind, a.sqn, a.payload_kind).cmp(&(b.kind, b.sqn, b.payload_kind))
    });

    let mut newest_base = [0u64; 4];
    for item in items.iter().filter(|item| item.is_base()) {
        let slot = &mut newest_base[item.kind.slot()];
        *slot = (*slot).max(item.sqn);
    }

    items.retain(|item| {
        let base = newest_base[item.kind.slot()];
        item.sqn > base || (item.sqn == base && item.is_base())
    });
    items.dedup_by(|later, earlier| {
        later.kind == earlier.kind
            && later.sqn == earlier.sqn
            && later.payload_kind == earlier.payload_kind
    });
    items
}
