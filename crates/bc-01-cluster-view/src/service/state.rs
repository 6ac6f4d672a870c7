use crate::domain::{
    EngineHandle, HaStatus, HealthStatus, RemoteServerHandle, RemoteServerRecord, RemovedServers,
    ServerIndex, ServerIndexAllocator, ServerRef, Timestamp,
};
use crate::error::ClusterResult;
use crate::events::ViewTask;
use crate::ports::outbound::{EngineCallbacks, ForwardingControl};
use crate::types::{ClusterViewConfig, ViewPhase};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Arena slot. The generation is bumped each time the slot's record is retired.
#[derive(Default)]
pub(crate) struct Slot {
    pub generation: u32,
    pub record: Option<RemoteServerRecord>,
}

/// A retired record whose index is still reserved.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Tombstone {
    pub handle: RemoteServerHandle,
    pub deleted_at: Timestamp,
}

/// The local server's own identity and self-record contents.
pub(crate) struct LocalServer {
    pub name: String,
    pub uid: String,
    pub cluster_name: String,
    /// Fixed by `recovery_completed`; 0 before that
    pub incarnation: u64,
    /// Incarnation read from the persisted self-record
    pub persisted_incarnation: Option<u64>,
    pub patterns: Vec<String>,
    pub engine_handle: Option<EngineHandle>,
    pub health: HealthStatus,
    pub ha: HaStatus,
    pub state_change_time: Timestamp,
}

impl LocalServer {
    pub fn server_ref(&self) -> ServerRef {
        ServerRef {
            handle: RemoteServerHandle::local(),
            name: self.name.clone(),
            uid: self.uid.clone(),
        }
    }
}

/// Everything guarded by the view keeper's lock.
pub(crate) struct ViewKeeperState {
    pub phase: ViewPhase,
    pub local: LocalServer,
    /// Fencing set
    pub removed: RemovedServers,
    pub engine: Option<Arc<dyn EngineCallbacks>>,
    pub forwarding: Option<Arc<dyn ForwardingControl>>,
    pub first_view_delivered: bool,
    pub last_view_version: u64,
    pub pending_tasks: Vec<ViewTask>,
    slots: Vec<Slot>,
    by_uid: HashMap<String, ServerIndex>,
    allocator: ServerIndexAllocator,
    tombstones: VecDeque<Tombstone>,
}

impl ViewKeeperState {
    pub fn new(config: &ClusterViewConfig, now: Timestamp) -> Self {
        Self {
            phase: ViewPhase::Started,
            local: LocalServer {
                name: config.server_name.clone(),
                uid: config.server_uid.clone(),
                cluster_name: config.cluster_name.clone(),
                incarnation: 0,
                persisted_incarnation: None,
                patterns: Vec::new(),
                engine_handle: None,
                health: HealthStatus::Unknown,
                ha: HaStatus::Unknown,
                state_change_time: now,
            },
            removed: RemovedServers::new(),
            engine: None,
            forwarding: None,
            first_view_delivered: false,
            last_view_version: 0,
            pending_tasks: Vec::new(),
            slots: Vec::new(),
            by_uid: HashMap::new(),
            allocator: ServerIndexAllocator::new(config.max_servers),
            tombstones: VecDeque::new(),
        }
    }

    /// Resolve a handle; stale generations and the local handle resolve to `None`.
    pub fn record(&self, handle: RemoteServerHandle) -> Option<&RemoteServerRecord> {
        if handle.is_local() {
            return None;
        }
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.record.as_ref()
    }

    pub fn record_mut(&mut self, handle: RemoteServerHandle) -> Option<&mut RemoteServerRecord> {
        if handle.is_local() {
            return None;
        }
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.record.as_mut()
    }

    pub fn handle_for_uid(&self, uid: &str) -> Option<RemoteServerHandle> {
        let index = *self.by_uid.get(uid)?;
        self.slots
            .get(index as usize)
            .and_then(|slot| slot.record.as_ref())
            .map(|record| record.handle)
    }

    pub fn records(&self) -> impl Iterator<Item = &RemoteServerRecord> {
        self.slots.iter().filter_map(|slot| slot.record.as_ref())
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut RemoteServerRecord> {
        self.slots.iter_mut().filter_map(|slot| slot.record.as_mut())
    }

    /// Allocate an index and place a fresh record in its slot.
    pub fn insert_record(
        &mut self,
        uid: &str,
        name: &str,
        incarnation: u64,
        now: Timestamp,
    ) -> ClusterResult<RemoteServerHandle> {
        let index = self.allocator.allocate()?;
        let position = index as usize;
        if self.slots.len() <= position {
            self.slots.resize_with(position + 1, Slot::default);
        }
        let slot = &mut self.slots[position];
        let handle = RemoteServerHandle::new(index, slot.generation);
        slot.record = Some(RemoteServerRecord::new(handle, uid, name, incarnation, now));
        self.by_uid.insert(uid.to_string(), index);
        Ok(handle)
    }

    /// Take the record out of the registry and tombstone its index.
    ///
    /// The index stays allocated until `sweep_tombstones` releases it.
    pub fn remove_record(
        &mut self,
        handle: RemoteServerHandle,
        now: Timestamp,
    ) -> Option<RemoteServerRecord> {
        self.record(handle)?;
        let slot = self.slots.get_mut(handle.index() as usize)?;
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.by_uid.remove(&record.uid);
        self.tombstones.push_back(Tombstone {
            handle,
            deleted_at: now,
        });
        Some(record)
    }

    pub fn is_tombstoned(&self, handle: RemoteServerHandle) -> bool {
        self.tombstones.iter().any(|t| t.handle == handle)
    }

    /// Free the indices of tombstones older than `grace_ms`.
    pub fn sweep_tombstones(&mut self, now: Timestamp, grace_ms: u64) -> usize {
        let mut freed = 0;
        while let Some(oldest) = self.tombstones.front() {
            if now.millis_since(oldest.deleted_at) < grace_ms {
                break;
            }
            if let Some(tombstone) = self.tombstones.pop_front() {
                self.allocator.free(tombstone.handle.index());
                freed += 1;
            }
        }
        freed
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    pub fn live_count(&self) -> usize {
        self.by_uid.len()
    }

    pub fn allocator(&self) -> &ServerIndexAllocator {
        &self.allocator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ViewKeeperState {
        ViewKeeperState::new(&ClusterViewConfig::for_testing(), Timestamp::new(0))
    }

    #[test]
    fn test_stale_handle_does_not_resolve() {
        let mut state = state();
        let handle = state
            .insert_record("A1", "a", 5, Timestamp::new(10))
            .unwrap();
        assert!(state.record(handle).is_some());

        let removed = state.remove_record(handle, Timestamp::new(20)).unwrap();
        assert_eq!(removed.uid, "A1");
        assert!(state.record(handle).is_none());
        assert!(state.handle_for_uid("A1").is_none());
        assert!(state.is_tombstoned(handle));
    }

    #[test]
    fn test_index_reserved_until_sweep() {
        let mut state = state();
        let first = state.insert_record("A1", "a", 1, Timestamp::new(0)).unwrap();
        state.remove_record(first, Timestamp::new(0));

        let second = state.insert_record("B1", "b", 1, Timestamp::new(50)).unwrap();
        assert_eq!(second.index(), 1);

        assert_eq!(state.sweep_tombstones(Timestamp::new(99), 100), 0);
        assert_eq!(state.sweep_tombstones(Timestamp::new(100), 100), 1);

        let third = state.insert_record("C1", "c", 1, Timestamp::new(100)).unwrap();
        assert_eq!(third.index(), 0);
        assert_eq!(third.generation(), first.generation() + 1);
        assert!(state.record(first).is_none());
    }

    #[test]
    fn test_local_handle_never_resolves() {
        let state = state();
        assert!(state.record(RemoteServerHandle::local()).is_none());
    }
}
