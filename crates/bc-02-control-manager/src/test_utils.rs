//! Recording membership service and fatal error handler for tests.

use crate::config::ControlConfig;
use crate::error::{ControlError, ControlResult};
use crate::ports::{FatalErrorHandler, MembershipService};
use crate::service::ControlManager;
use async_trait::async_trait;
use bc_01_cluster_view::test_utils::ViewKeeperHarness;
use bc_01_cluster_view::{ClusterError, FilterKind, RemovedServers, ServerRef};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MembershipCall {
    PublishRemovedServers(RemovedServers),
    RequestFreshBase { uid: String, kind: FilterKind },
    ClearRetainedAttributes { uid: String, incarnation: u64 },
    PublishRestored(Vec<String>),
    LeaveCluster,
}

/// How `leave_cluster` resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaveBehavior {
    Acknowledge,
    NeverAcknowledge,
    Fail,
}

#[derive(Debug)]
pub struct RecordingMembership {
    calls: Mutex<Vec<MembershipCall>>,
    leave: Mutex<LeaveBehavior>,
    refuse_clear: AtomicBool,
}

impl Default for RecordingMembership {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingMembership {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            leave: Mutex::new(LeaveBehavior::Acknowledge),
            refuse_clear: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<MembershipCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&MembershipCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    pub fn set_leave_behavior(&self, behavior: LeaveBehavior) {
        *self.leave.lock() = behavior;
    }

    /// Answer `clear_retained_attributes` with "still alive".
    pub fn set_refuse_clear(&self, refuse: bool) {
        self.refuse_clear.store(refuse, Ordering::SeqCst);
    }

    fn record(&self, call: MembershipCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl MembershipService for RecordingMembership {
    async fn publish_removed_servers(&self, removed: &RemovedServers) -> ControlResult<()> {
        self.record(MembershipCall::PublishRemovedServers(removed.clone()));
        Ok(())
    }

    async fn request_fresh_base(&self, uid: &str, kind: FilterKind) -> ControlResult<()> {
        self.record(MembershipCall::RequestFreshBase {
            uid: uid.to_string(),
            kind,
        });
        Ok(())
    }

    async fn clear_retained_attributes(&self, uid: &str, incarnation: u64) -> ControlResult<bool> {
        self.record(MembershipCall::ClearRetainedAttributes {
            uid: uid.to_string(),
            incarnation,
        });
        Ok(!self.refuse_clear.load(Ordering::SeqCst))
    }

    async fn publish_restored_not_in_view(&self, servers: &[ServerRef]) -> ControlResult<()> {
        self.record(MembershipCall::PublishRestored(
            servers.iter().map(|s| s.uid.clone()).collect(),
        ));
        Ok(())
    }

    async fn leave_cluster(&self) -> ControlResult<()> {
        self.record(MembershipCall::LeaveCluster);
        let behavior = *self.leave.lock();
        match behavior {
            LeaveBehavior::Acknowledge => Ok(()),
            LeaveBehavior::NeverAcknowledge => std::future::pending().await,
            LeaveBehavior::Fail => Err(ControlError::Membership {
                operation: "leave_cluster",
                reason: "transport closed".into(),
            }),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingFatalHandler {
    errors: Mutex<Vec<String>>,
}

impl RecordingFatalHandler {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl FatalErrorHandler for RecordingFatalHandler {
    fn request_maintenance_mode(&self, error: &ClusterError) {
        self.errors.lock().push(error.to_string());
    }
}

/// A control manager over a `ViewKeeperHarness`.
pub struct ControlHarness {
    pub manager: Arc<ControlManager>,
    pub view: ViewKeeperHarness,
    pub membership: Arc<RecordingMembership>,
    pub fatal: Arc<RecordingFatalHandler>,
}

impl ControlHarness {
    /// Created state, view callbacks registered.
    pub fn created() -> Self {
        Self::over(ViewKeeperHarness::started())
    }

    /// Wrap an existing view harness.
    pub fn over(view: ViewKeeperHarness) -> Self {
        let membership = Arc::new(RecordingMembership::new());
        let fatal = Arc::new(RecordingFatalHandler::default());
        let manager = match ControlManager::new(
            ControlConfig::for_testing(),
            view.keeper.clone(),
            membership.clone(),
            fatal.clone(),
        ) {
            Ok(manager) => Arc::new(manager),
            Err(err) => panic!("invalid test configuration: {err}"),
        };
        Self {
            manager,
            view,
            membership,
            fatal,
        }
    }

    /// Running with incarnation 1.
    pub async fn running() -> Self {
        let harness = Self::created();
        if let Err(err) = harness.manager.recovery_completed(1).await {
            panic!("recovery_completed failed: {err}");
        }
        harness
    }
}
