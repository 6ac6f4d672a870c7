//! Server index allocator
//!
//! Hands out the smallest free index so that array-based lookups over
//! remote servers stay dense. Freed indices are tracked as explicit gaps
//! below the high-water mark.

use super::entities::ServerIndex;
use crate::error::{ClusterError, ClusterResult};
use std::collections::BTreeSet;

/// Allocator for dense, reusable `ServerIndex` values.
#[derive(Debug)]
pub struct ServerIndexAllocator {
    /// Number of indices ever handed out: allocated indices are `[0, next)` minus `gaps`
    next: ServerIndex,
    /// Freed indices below `next`
    gaps: BTreeSet<ServerIndex>,
    max_servers: u32,
}

impl ServerIndexAllocator {
    pub fn new(max_servers: u32) -> Self {
        Self {
            next: 0,
            gaps: BTreeSet::new(),
            max_servers,
        }
    }

    /// Allocate the smallest index not currently in use.
    pub fn allocate(&mut self) -> ClusterResult<ServerIndex> {
        if let Some(index) = self.gaps.pop_first() {
            return Ok(index);
        }
        if self.next >= self.max_servers {
            return Err(ClusterError::CapacityExhausted {
                max: self.max_servers,
            });
        }
        let index = self.next;
        self.next += 1;
        Ok(index)
    }

    /// Return an index to the pool.
    ///
    /// Must only be called once the owning record is fully retired.
    /// Freeing an index that is not allocated is ignored and reported as `false`.
    pub fn free(&mut self, index: ServerIndex) -> bool {
        if index >= self.next || self.gaps.contains(&index) {
            return false;
        }
        if index + 1 == self.next {
            self.next -= 1;
            // Trailing gaps collapse into the high-water mark
            while self.next > 0 && self.gaps.remove(&(self.next - 1)) {
                self.next -= 1;
            }
        } else {
            self.gaps.insert(index);
        }
        true
    }

    /// Whether `index` is currently handed out.
    pub fn is_allocated(&self, index: ServerIndex) -> bool {
        index < self.next && !self.gaps.contains(&index)
    }

    pub fn allocated_count(&self) -> usize {
        self.next as usize - self.gaps.len()
    }

    /// Indices that can still be handed out.
    pub fn available(&self) -> usize {
        (self.max_servers as usize).saturating_sub(self.allocated_count())
    }

    /// Exclusive upper bound of all allocated indices.
    pub fn high_water(&self) -> ServerIndex {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_allocate_starts_at_zero() {
        let mut alloc = ServerIndexAllocator::new(8);
        assert_eq!(alloc.allocate().unwrap(), 0);
        assert_eq!(alloc.allocate().unwrap(), 1);
        assert_eq!(alloc.allocate().unwrap(), 2);
    }

    #[test]
    fn test_reuses_smallest_gap() {
        let mut alloc = ServerIndexAllocator::new(8);
        for _ in 0..4 {
            alloc.allocate().unwrap();
        }
        assert!(alloc.free(2));
        assert!(alloc.free(0));
        assert_eq!(alloc.allocate().unwrap(), 0);
        assert_eq!(alloc.allocate().unwrap(), 2);
        assert_eq!(alloc.allocate().unwrap(), 4);
    }

    #[test]
    fn test_trailing_free_lowers_high_water() {
        let mut alloc = ServerIndexAllocator::new(8);
        for _ in 0..3 {
            alloc.allocate().unwrap();
        }
        alloc.free(1);
        alloc.free(2);
        assert_eq!(alloc.high_water(), 1);
        assert_eq!(alloc.allocated_count(), 1);
        assert_eq!(alloc.available(), 7);
    }

    #[test]
    fn test_capacity_exhausted() {
        let mut alloc = ServerIndexAllocator::new(2);
        alloc.allocate().unwrap();
        alloc.allocate().unwrap();
        assert!(matches!(
            alloc.allocate(),
            Err(ClusterError::CapacityExhausted { max: 2 })
        ));
        alloc.free(0);
        assert_eq!(alloc.allocate().unwrap(), 0);
    }

    #[test]
    fn test_double_free_ignored() {
        let mut alloc = ServerIndexAllocator::new(4);
        alloc.allocate().unwrap();
        alloc.allocate().unwrap();
        assert!(alloc.free(0));
        assert!(!alloc.free(0));
        assert!(!alloc.free(3));
        assert_eq!(alloc.allocated_count(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Allocate,
        Free(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Allocate), (0usize..64).prop_map(Op::Free)]
    }

    proptest! {
        #[test]
        fn prop_indices_unique_and_dense(ops in prop::collection::vec(op_strategy(), 1..200)) {
            let mut alloc = ServerIndexAllocator::new(1024);
            let mut live: Vec<ServerIndex> = Vec::new();
            let mut high_water_live = 0usize;

            for op in ops {
                match op {
                    Op::Allocate => {
                        let index = alloc.allocate().unwrap();
                        prop_assert!(!live.contains(&index));
                        live.push(index);
                    }
                    Op::Free(pick) => {
                        if !live.is_empty() {
                            let index = live.swap_remove(pick % live.len());
                            prop_assert!(alloc.free(index));
                        }
                    }
                }
                high_water_live = high_water_live.max(live.len());

                let unique: HashSet<_> = live.iter().copied().collect();
                prop_assert_eq!(unique.len(), live.len());
                prop_assert!(live.iter().all(|&i| (i as usize) < high_water_live));
                prop_assert_eq!(alloc.allocated_count(), live.len());
            }
        }
    }
}
