use super::core::ViewKeeper;
use tracing::debug;

impl ViewKeeper {
    /// Release the indices of deleted servers whose grace period elapsed.
    ///
    /// Call from a timer task; returns how many indices were freed.
    pub fn sweep_deleted(&self) -> usize {
        let now = self.now();
        let grace = self.config.deleted_node_grace_period.as_millis() as u64;
        self.run(|state, _| {
            let freed = state.sweep_tombstones(now, grace);
            if freed > 0 {
                debug!(freed, remaining = state.tombstone_count(), "deleted server indices released");
            }
            freed
        })
    }

    /// Deleted servers still holding their index.
    pub fn pending_deletions(&self) -> usize {
        self.read(|state| state.tombstone_count())
    }

    /// Number of server indices currently allocated, live or tombstoned.
    pub fn allocated_indices(&self) -> usize {
        self.read(|state| state.allocator().allocated_count())
    }
}
