use super::callout::Callout;
use super::state::ViewKeeperState;
use crate::adapters::BincodeRecordCodec;
use crate::domain::{RemoteServerRecord, StoredRecord, StoredRemoteRecord, StoredSelfRecord, Timestamp};
use crate::error::{ClusterError, ClusterResult};
use crate::events::ViewTask;
use crate::ports::outbound::{EngineCallbacks, ForwardingControl, RecordCodec, TimeSource};
use crate::types::{ClusterViewConfig, ViewPhase};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::{info, warn};

/// Registry of remote servers and the state machine driving them.
///
/// All entry points take one reentrant lock. Decisions are made under a
/// `RefCell` borrow, then the borrow is dropped and the resulting callouts
/// are dispatched with the lock still held. Callbacks can therefore call
/// back into the keeper from the same thread, while callouts produced by
/// different threads are never interleaved.
///
/// # Example
///
/// ```rust,ignore
/// use bc_01_cluster_view::{ClusterViewConfig, ViewKeeper, SystemTimeSource};
///
/// let keeper = ViewKeeper::new(config, Arc::new(SystemTimeSource))?;
/// keeper.register_engine(engine)?;
/// keeper.register_forwarding(forwarding)?;
/// let mappings = keeper.restore_remote_servers(stored)?;
/// keeper.recovery_completed(previous_incarnation + 1)?;
/// ```
pub struct ViewKeeper {
    pub(crate) config: ClusterViewConfig,
    pub(crate) inner: ReentrantMutex<RefCell<ViewKeeperState>>,
    pub(crate) time_source: Arc<dyn TimeSource>,
    pub(crate) codec: Arc<dyn RecordCodec>,
}

impl ViewKeeper {
    /// Create a view keeper that persists records with bincode.
    pub fn new(config: ClusterViewConfig, time_source: Arc<dyn TimeSource>) -> ClusterResult<Self> {
        Self::with_codec(config, time_source, Arc::new(BincodeRecordCodec))
    }

    pub fn with_codec(
        config: ClusterViewConfig,
        time_source: Arc<dyn TimeSource>,
        codec: Arc<dyn RecordCodec>,
    ) -> ClusterResult<Self> {
        config.validate()?;
        let state = ViewKeeperState::new(&config, time_source.now());
        info!(
            server = %config.server_name,
            uid = %config.server_uid,
            cluster = %config.cluster_name,
            max_servers = config.max_servers,
            "view keeper created"
        );
        Ok(Self {
            config,
            inner: ReentrantMutex::new(RefCell::new(state)),
            time_source,
            codec,
        })
    }

    pub fn config(&self) -> &ClusterViewConfig {
        &self.config
    }

    pub fn phase(&self) -> ViewPhase {
        self.read(|state| state.phase)
    }

    /// Register the engine callbacks. Replaces a previous registration.
    pub fn register_engine(&self, engine: Arc<dyn EngineCallbacks>) -> ClusterResult<()> {
        self.run(|state, _| {
            if state.phase.is_terminated() {
                return Err(ClusterError::NotAvailable {
                    operation: "register_engine",
                    phase: state.phase.to_string(),
                });
            }
            state.engine = Some(engine);
            Ok(())
        })
    }

    pub fn register_forwarding(&self, forwarding: Arc<dyn ForwardingControl>) -> ClusterResult<()> {
        self.run(|state, _| {
            if state.phase.is_terminated() {
                return Err(ClusterError::NotAvailable {
                    operation: "register_forwarding",
                    phase: state.phase.to_string(),
                });
            }
            state.forwarding = Some(forwarding);
            Ok(())
        })
    }

    /// Drain the tasks queued for the control manager.
    pub fn take_pending_tasks(&self) -> Vec<ViewTask> {
        self.run(|state, _| std::mem::take(&mut state.pending_tasks))
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    /// Decide under the borrow, then dispatch callouts. Callout failures are
    /// logged and otherwise ignored.
    pub(crate) fn run<R>(
        &self,
        decide: impl FnOnce(&mut ViewKeeperState, &mut Vec<Callout>) -> R,
    ) -> R {
        self.run_inner(decide).0
    }

    /// Like `run`, but a failed callout becomes the result.
    pub(crate) fn run_checked<R>(
        &self,
        decide: impl FnOnce(&mut ViewKeeperState, &mut Vec<Callout>) -> ClusterResult<R>,
    ) -> ClusterResult<R> {
        let (result, failure) = self.run_inner(decide);
        let value = result?;
        match failure {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    fn run_inner<R>(
        &self,
        decide: impl FnOnce(&mut ViewKeeperState, &mut Vec<Callout>) -> R,
    ) -> (R, Option<ClusterError>) {
        let guard = self.inner.lock();
        let mut callouts = Vec::new();
        let result = {
            let mut state = guard.borrow_mut();
            decide(&mut state, &mut callouts)
        };
        let failure = if callouts.is_empty() {
            None
        } else {
            self.dispatch(&guard, callouts)
        };
        (result, failure)
    }

    /// Read under one critical section.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&ViewKeeperState) -> R) -> R {
        let guard = self.inner.lock();
        let state = guard.borrow();
        f(&state)
    }

    /// Queue a commit of the self-record.
    pub(crate) fn persist_self(&self, state: &ViewKeeperState, out: &mut Vec<Callout>) {
        let record = StoredRecord::Local(StoredSelfRecord {
            uid: state.local.uid.clone(),
            incarnation: state.local.incarnation,
            patterns: state.local.patterns.clone(),
            removed_servers: (!state.removed.is_empty()).then(|| state.removed.clone()),
            cluster_name: Some(state.local.cluster_name.clone()),
        });
        match self.codec.encode(&record) {
            Ok(data) => out.push(Callout::EngineUpdate {
                server: None,
                data,
                commit: true,
            }),
            Err(err) => warn!(error = %err, "failed to encode self record"),
        }
    }

    /// Encode a remote record's current filter positions.
    pub(crate) fn encode_remote(&self, record: &RemoteServerRecord) -> Option<Vec<u8>> {
        let stored = StoredRecord::Remote(StoredRemoteRecord {
            uid: record.uid.clone(),
            name: record.name.clone(),
            incarnation: record.incarnation,
            sequences: record.sequences.states(),
        });
        match self.codec.encode(&stored) {
            Ok(data) => Some(data),
            Err(err) => {
                warn!(uid = %record.uid, error = %err, "failed to encode remote record");
                None
            }
        }
    }
}
