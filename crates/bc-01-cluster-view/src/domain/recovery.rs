//! Recovery filter state and reconciliation
//!
//! After a restart every restored remote server is routed with `route_all`
//! until the filter state delivered live over the network has caught up with
//! what was persisted before the restart.

use super::filter_sequence::{FilterKind, FilterSequences};

/// Filter sequence positions of a remote server as persisted before restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryFilterState {
    /// Incarnation of the remote server when the state was persisted
    pub incarnation: u64,
    pub sequences: FilterSequences,
}

impl RecoveryFilterState {
    pub fn new(incarnation: u64, sequences: FilterSequences) -> Self {
        Self {
            incarnation,
            sequences,
        }
    }

    /// Nothing was persisted, so there is nothing to reconcile against.
    pub fn is_empty(&self) -> bool {
        FilterKind::ALL
            .iter()
            .all(|&kind| self.sequences.get(kind).is_empty())
    }

    /// Whether live state has caught up with the recovered state.
    ///
    /// Same incarnation: every kind's live `last_update_sqn` must reach the
    /// recovered value. Newer incarnation: the remote restarted and its
    /// sequence space began again, so every kind that had recovered state
    /// only needs to have received a live base.
    pub fn is_reconciled(&self, live_incarnation: u64, live: &FilterSequences) -> bool {
        if live_incarnation > self.incarnation {
            FilterKind::ALL.iter().all(|&kind| {
                self.sequences.get(kind).is_empty() || live.get(kind).has_base()
            })
        } else {
            FilterKind::ALL.iter().all(|&kind| {
                live.get(kind).last_update_sqn >= self.sequences.get(kind).last_update_sqn
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter_sequence::{FilterUpdate, SequenceState};

    fn recovered_exact(last: u64) -> RecoveryFilterState {
        RecoveryFilterState::new(
            3,
            FilterSequences::from_states([
                SequenceState::new(last, last),
                SequenceState::default(),
                SequenceState::default(),
                SequenceState::default(),
            ]),
        )
    }

    #[test]
    fn test_reconciled_when_live_reaches_recovered() {
        let recovered = recovered_exact(7);
        let mut live = FilterSequences::new();
        assert!(!recovered.is_reconciled(3, &live));

        live.offer(&FilterUpdate::base(FilterKind::ExactBloom, 5, vec![]));
        live.offer(&FilterUpdate::update(FilterKind::ExactBloom, 6, vec![]));
        assert!(!recovered.is_reconciled(3, &live));

        live.offer(&FilterUpdate::update(FilterKind::ExactBloom, 7, vec![]));
        assert!(recovered.is_reconciled(3, &live));
    }

    #[test]
    fn test_newer_incarnation_needs_only_a_base() {
        let recovered = recovered_exact(40);
        let mut live = FilterSequences::new();
        assert!(!recovered.is_reconciled(4, &live));

        live.offer(&FilterUpdate::base(FilterKind::ExactBloom, 1, vec![]));
        assert!(recovered.is_reconciled(4, &live));
    }

    #[test]
    fn test_empty_state() {
        assert!(RecoveryFilterState::new(1, FilterSequences::new()).is_empty());
        assert!(!recovered_exact(2).is_empty());
    }
}
