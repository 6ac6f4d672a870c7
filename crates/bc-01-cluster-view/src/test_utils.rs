//! Test utilities for the cluster view.
//!
//! Recording implementations of the engine and forwarding callbacks, a
//! controllable clock and small builders. Enable with the `test-utils`
//! feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use bc_01_cluster_view::test_utils::ViewKeeperHarness;
//!
//! let harness = ViewKeeperHarness::active();
//! assert!(harness.keeper.get_view().remote.is_empty());
//! ```

use crate::domain::{
    EngineHandle, FilterKind, ForwardingEndpoint, PendingUpdate, ProtocolVersionRange,
    RemoteServerHandle, ServerInfo, ServerRef, Timestamp,
};
use crate::events::{NodeInfo, NodeMetadata};
use crate::ports::inbound::RestoredRecord;
use crate::ports::outbound::{
    CallbackError, CallbackResult, EngineCallbacks, EngineStatistics, ForwardingControl,
    TimeSource,
};
use crate::service::ViewKeeper;
use crate::types::ClusterViewConfig;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ControllableTimeSource {
    millis: AtomicU64,
}

impl ControllableTimeSource {
    pub fn new(initial_millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(initial_millis),
        }
    }

    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.millis.load(Ordering::SeqCst))
    }
}

/// One engine callback as observed by `RecordingEngine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Create { uid: String, handle: RemoteServerHandle, engine: EngineHandle },
    CreateLocal { uid: String, engine: EngineHandle },
    Connected { uid: String },
    Disconnected { uid: String },
    Remove { uid: String, engine: EngineHandle },
    RouteAll { uid: String, enabled: bool },
    ReplaceFilter { uid: String, kind: FilterKind, sqn: u64 },
    ApplyFilterUpdate { uid: String, kind: FilterKind, sqn: u64 },
    AddSubscriptions { uid: String, patterns: Vec<String> },
    RemoveSubscriptions { uid: String, patterns: Vec<String> },
    Update { engine: EngineHandle, commit: bool },
    Term,
}

/// Engine double that records every callback and keeps the last stored
/// bytes per engine handle, so a restart can be simulated.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    events: Mutex<Vec<EngineEvent>>,
    store: Mutex<BTreeMap<u64, Vec<u8>>>,
    next_handle: AtomicU64,
    fail_create: AtomicBool,
    closed: AtomicBool,
    statistics: Mutex<EngineStatistics>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Engine that keeps the records of a previous run.
    pub fn with_store(records: &[RestoredRecord]) -> Self {
        let engine = Self::new();
        let mut highest = 0;
        {
            let mut store = engine.store.lock();
            for record in records {
                store.insert(record.engine_handle.0, record.data.clone());
                highest = highest.max(record.engine_handle.0);
            }
        }
        engine.next_handle.store(highest + 1, Ordering::SeqCst);
        engine
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    pub fn count(&self, predicate: impl Fn(&EngineEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn connected_count(&self, uid: &str) -> usize {
        self.count(|e| matches!(e, EngineEvent::Connected { uid: u } if u == uid))
    }

    pub fn disconnected_count(&self, uid: &str) -> usize {
        self.count(|e| matches!(e, EngineEvent::Disconnected { uid: u } if u == uid))
    }

    /// Filter deliveries for one server, in order.
    pub fn filter_events(&self, uid: &str) -> Vec<EngineEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| match e {
                EngineEvent::ReplaceFilter { uid: u, .. }
                | EngineEvent::ApplyFilterUpdate { uid: u, .. } => u == uid,
                _ => false,
            })
            .cloned()
            .collect()
    }

    /// Last stored bytes per engine handle, as the engine would hand them back on restart.
    pub fn stored_records(&self) -> Vec<RestoredRecord> {
        self.store
            .lock()
            .iter()
            .map(|(handle, data)| RestoredRecord {
                engine_handle: EngineHandle(*handle),
                data: data.clone(),
            })
            .collect()
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Make every callback report `CallbackError::Closed`.
    pub fn set_closed(&self, closed: bool) {
        self.closed.store(closed, Ordering::SeqCst);
    }

    pub fn set_statistics(&self, statistics: EngineStatistics) {
        *self.statistics.lock() = statistics;
    }

    fn record(&self, event: EngineEvent) -> CallbackResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CallbackError::Closed);
        }
        self.events.lock().push(event);
        Ok(())
    }

    fn allocate(&self) -> EngineHandle {
        EngineHandle(self.next_handle.fetch_add(1, Ordering::SeqCst))
    }
}

impl EngineCallbacks for RecordingEngine {
    fn create(&self, server: &ServerRef) -> CallbackResult<EngineHandle> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(CallbackError::Failed {
                reason: "create refused".into(),
            });
        }
        let engine = self.allocate();
        self.record(EngineEvent::Create {
            uid: server.uid.clone(),
            handle: server.handle,
            engine,
        })?;
        Ok(engine)
    }

    fn create_local(&self, server: &ServerRef) -> CallbackResult<EngineHandle> {
        let engine = self.allocate();
        self.record(EngineEvent::CreateLocal {
            uid: server.uid.clone(),
            engine,
        })?;
        Ok(engine)
    }

    fn connected(&self, _engine: EngineHandle, server: &ServerRef) -> CallbackResult<()> {
        self.record(EngineEvent::Connected {
            uid: server.uid.clone(),
        })
    }

    fn disconnected(&self, _engine: EngineHandle, server: &ServerRef) -> CallbackResult<()> {
        self.record(EngineEvent::Disconnected {
            uid: server.uid.clone(),
        })
    }

    fn remove(&self, engine: EngineHandle, server: &ServerRef) -> CallbackResult<()> {
        self.store.lock().remove(&engine.0);
        self.record(EngineEvent::Remove {
            uid: server.uid.clone(),
            engine,
        })
    }

    fn route_all(
        &self,
        _engine: EngineHandle,
        server: &ServerRef,
        enabled: bool,
    ) -> CallbackResult<()> {
        self.record(EngineEvent::RouteAll {
            uid: server.uid.clone(),
            enabled,
        })
    }

    fn replace_filter(
        &self,
        _engine: EngineHandle,
        server: &ServerRef,
        kind: FilterKind,
        sqn: u64,
        _payload: &[u8],
    ) -> CallbackResult<()> {
        self.record(EngineEvent::ReplaceFilter {
            uid: server.uid.clone(),
            kind,
            sqn,
        })
    }

    fn apply_filter_update(
        &self,
        _engine: EngineHandle,
        server: &ServerRef,
        kind: FilterKind,
        sqn: u64,
        _payload: &[u8],
    ) -> CallbackResult<()> {
        self.record(EngineEvent::ApplyFilterUpdate {
            uid: server.uid.clone(),
            kind,
            sqn,
        })
    }

    fn add_subscriptions(
        &self,
        _engine: EngineHandle,
        server: &ServerRef,
        patterns: &[String],
    ) -> CallbackResult<()> {
        self.record(EngineEvent::AddSubscriptions {
            uid: server.uid.clone(),
            patterns: patterns.to_vec(),
        })
    }

    fn remove_subscriptions(
        &self,
        _engine: EngineHandle,
        server: &ServerRef,
        patterns: &[String],
    ) -> CallbackResult<()> {
        self.record(EngineEvent::RemoveSubscriptions {
            uid: server.uid.clone(),
            patterns: patterns.to_vec(),
        })
    }

    fn update(&self, engine: EngineHandle, data: &[u8], commit: bool) -> CallbackResult<PendingUpdate> {
        self.record(EngineEvent::Update { engine, commit })?;
        self.store.lock().insert(engine.0, data.to_vec());
        Ok(PendingUpdate(engine.0))
    }

    fn report_statistics(&self) -> CallbackResult<EngineStatistics> {
        Ok(*self.statistics.lock())
    }

    fn term(&self) -> CallbackResult<()> {
        self.record(EngineEvent::Term)
    }
}

/// One forwarding control call as observed by `RecordingForwarding`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardingEvent {
    Add { uid: String, endpoint: Option<ForwardingEndpoint> },
    Connect { uid: String, endpoint: ForwardingEndpoint },
    Disconnect { uid: String },
    Remove { uid: String },
    Term,
}

#[derive(Debug, Default)]
pub struct RecordingForwarding {
    events: Mutex<Vec<ForwardingEvent>>,
}

impl RecordingForwarding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ForwardingEvent> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    pub fn count(&self, predicate: impl Fn(&ForwardingEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl ForwardingControl for RecordingForwarding {
    fn add(&self, server: &ServerRef, endpoint: Option<&ForwardingEndpoint>) -> CallbackResult<()> {
        self.events.lock().push(ForwardingEvent::Add {
            uid: server.uid.clone(),
            endpoint: endpoint.cloned(),
        });
        Ok(())
    }

    fn connect(&self, server: &ServerRef, endpoint: &ForwardingEndpoint) -> CallbackResult<()> {
        self.events.lock().push(ForwardingEvent::Connect {
            uid: server.uid.clone(),
            endpoint: endpoint.clone(),
        });
        Ok(())
    }

    fn disconnect(&self, server: &ServerRef) -> CallbackResult<()> {
        self.events.lock().push(ForwardingEvent::Disconnect {
            uid: server.uid.clone(),
        });
        Ok(())
    }

    fn remove(&self, server: &ServerRef) -> CallbackResult<()> {
        self.events.lock().push(ForwardingEvent::Remove {
            uid: server.uid.clone(),
        });
        Ok(())
    }

    fn term(&self) -> CallbackResult<()> {
        self.events.lock().push(ForwardingEvent::Term);
        Ok(())
    }
}

/// A view keeper wired to recording callbacks and a controllable clock.
pub struct ViewKeeperHarness {
    pub keeper: Arc<ViewKeeper>,
    pub engine: Arc<RecordingEngine>,
    pub forwarding: Arc<RecordingForwarding>,
    pub clock: Arc<ControllableTimeSource>,
}

impl ViewKeeperHarness {
    /// Callbacks registered, recovery not yet completed.
    pub fn started() -> Self {
        Self::with_engine(ClusterViewConfig::for_testing(), RecordingEngine::new())
    }

    /// Started and recovered with incarnation 1.
    pub fn active() -> Self {
        let harness = Self::started();
        harness.complete_recovery(1);
        harness
    }

    pub fn with_engine(config: ClusterViewConfig, engine: RecordingEngine) -> Self {
        let clock = Arc::new(ControllableTimeSource::new(1_000));
        let engine = Arc::new(engine);
        let forwarding = Arc::new(RecordingForwarding::new());
        let keeper = match ViewKeeper::new(config, clock.clone()) {
            Ok(keeper) => Arc::new(keeper),
            Err(err) => panic!("invalid test configuration: {err}"),
        };
        if let Err(err) = keeper.register_engine(engine.clone()) {
            panic!("engine registration failed: {err}");
        }
        if let Err(err) = keeper.register_forwarding(forwarding.clone()) {
            panic!("forwarding registration failed: {err}");
        }
        Self {
            keeper,
            engine,
            forwarding,
            clock,
        }
    }

    pub fn complete_recovery(&self, incarnation: u64) {
        if let Err(err) = self.keeper.recovery_completed(incarnation) {
            panic!("recovery_completed({incarnation}) failed: {err}");
        }
    }

    /// Restart against the engine's stored records: a new keeper and engine
    /// are built, the records restored, and recovery completed with `incarnation`.
    pub fn restart(&self, incarnation: u64) -> Self {
        let stored = self.engine.stored_records();
        let harness =
            Self::with_engine(self.keeper.config().clone(), RecordingEngine::with_store(&stored));
        if let Err(err) = harness.keeper.restore_remote_servers(stored) {
            panic!("restore failed: {err}");
        }
        harness.complete_recovery(incarnation);
        harness
    }
}

pub fn make_node(uid: &str, incarnation: u64) -> NodeInfo {
    NodeInfo::new(uid, incarnation)
}

pub fn make_endpoint(port: u16) -> ForwardingEndpoint {
    ForwardingEndpoint {
        address: "10.0.0.1".into(),
        port,
        tls: false,
    }
}

/// Join metadata with a server name, the default protocol range and an endpoint.
pub fn join_metadata(name: &str, port: u16) -> NodeMetadata {
    NodeMetadata::new()
        .with_server_info(ServerInfo {
            name: name.into(),
            protocol: ProtocolVersionRange::default(),
        })
        .with_forwarding(make_endpoint(port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controllable_clock_advances() {
        let clock = ControllableTimeSource::new(10);
        clock.advance(5);
        assert_eq!(clock.now(), Timestamp::new(15));
        clock.set(3);
        assert_eq!(clock.now().as_millis(), 3);
    }

    #[test]
    fn test_engine_keeps_latest_store_bytes() {
        let engine = RecordingEngine::new();
        let server = ServerRef {
            handle: RemoteServerHandle::new(0, 0),
            name: "a".into(),
            uid: "A1".into(),
        };
        let handle = engine.create(&server).unwrap();
        engine.update(handle, b"one", false).unwrap();
        engine.update(handle, b"two", true).unwrap();

        let stored = engine.stored_records();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].data, b"two".to_vec());

        engine.remove(handle, &server).unwrap();
        assert!(engine.stored_records().is_empty());
    }
}
