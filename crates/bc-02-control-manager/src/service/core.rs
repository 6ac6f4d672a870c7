use crate::config::ControlConfig;
use crate::error::{ControlError, ControlResult};
use crate::ports::{FatalErrorHandler, MembershipService};
use bc_01_cluster_view::{
    EngineCallbacks, EngineStatistics, ForwardingControl, RemoteServerHandle, RestoredMapping,
    RestoredRecord, SystemTimeSource, ViewKeeper,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Control manager lifecycle.
///
/// ```text
/// [CREATED] ──recovery_completed──→ [RUNNING] ──detach──→ [DETACHED] ──close──→ [CLOSED]
///     │                                                                   ↑
///     └───────────────────────────────close───────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlState {
    Created,
    Running,
    Detached,
    Closed,
}

impl ControlState {
    pub fn accepts_events(&self) -> bool {
        matches!(self, Self::Created | Self::Running)
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Detached => write!(f, "detached"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Forwarding layer signal waiting for delivery to the view keeper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewNotification {
    Connected(RemoteServerHandle),
    Disconnected(RemoteServerHandle),
}

pub(crate) struct StatisticsSample {
    pub taken_at: Instant,
    pub statistics: EngineStatistics,
}

/// Orchestration shell around the `ViewKeeper`.
///
/// Feeds membership events into the view, executes the tasks the view
/// queues, serializes forwarding signals and owns the detach wait.
pub struct ControlManager {
    pub(crate) config: ControlConfig,
    pub(crate) view: Arc<ViewKeeper>,
    pub(crate) membership: Arc<dyn MembershipService>,
    pub(crate) fatal: Arc<dyn FatalErrorHandler>,
    pub(crate) state: Mutex<ControlState>,
    pub(crate) notifications: Mutex<VecDeque<ViewNotification>>,
    /// Held for a whole drain so signals are delivered in FIFO order
    pub(crate) drain_lock: Mutex<()>,
    pub(crate) wakeup: Notify,
    /// Serializes task execution
    pub(crate) task_lock: tokio::sync::Mutex<()>,
    pub(crate) statistics: Mutex<Option<StatisticsSample>>,
}

impl ControlManager {
    pub fn new(
        config: ControlConfig,
        view: Arc<ViewKeeper>,
        membership: Arc<dyn MembershipService>,
        fatal: Arc<dyn FatalErrorHandler>,
    ) -> ControlResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            view,
            membership,
            fatal,
            state: Mutex::new(ControlState::Created),
            notifications: Mutex::new(VecDeque::new()),
            drain_lock: Mutex::new(()),
            wakeup: Notify::new(),
            task_lock: tokio::sync::Mutex::new(()),
            statistics: Mutex::new(None),
        })
    }

    /// Build the view keeper from `config` and register the callbacks.
    pub fn from_config(
        config: ControlConfig,
        engine: Arc<dyn EngineCallbacks>,
        forwarding: Arc<dyn ForwardingControl>,
        membership: Arc<dyn MembershipService>,
        fatal: Arc<dyn FatalErrorHandler>,
    ) -> ControlResult<Self> {
        let config = config.with_resolved_uid();
        let view = ViewKeeper::new(config.view_config()?, Arc::new(SystemTimeSource))?;
        view.register_engine(engine)?;
        view.register_forwarding(forwarding)?;
        info!(
            server = %config.server_name,
            uid = config.server_uid.as_deref().unwrap_or_default(),
            cluster = %config.cluster_name,
            "control manager created"
        );
        Self::new(config, Arc::new(view), membership, fatal)
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn view(&self) -> &Arc<ViewKeeper> {
        &self.view
    }

    pub fn state(&self) -> ControlState {
        *self.state.lock()
    }

    pub(crate) fn require_state(
        &self,
        operation: &'static str,
        allowed: &[ControlState],
    ) -> ControlResult<()> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(ControlError::NotAvailable {
                operation,
                state: state.to_string(),
            })
        }
    }

    /// Restore persisted server records into the view.
    pub fn restore_remote_servers(
        &self,
        records: Vec<RestoredRecord>,
    ) -> ControlResult<Vec<RestoredMapping>> {
        self.require_state("restore_remote_servers", &[ControlState::Created])?;
        let count = records.len();
        match self.view.restore_remote_servers(records) {
            Ok(mappings) => {
                info!(records = count, restored = mappings.len(), "stored records restored");
                Ok(mappings)
            }
            Err(err) => {
                error!(error = %err, "restore failed");
                Err(err.into())
            }
        }
    }

    /// Finish recovery and start serving the cluster.
    ///
    /// Restored servers the membership layer has not reported yet are
    /// published, then any queued tasks run.
    pub async fn recovery_completed(&self, incarnation: u64) -> ControlResult<()> {
        self.require_state("recovery_completed", &[ControlState::Created])?;
        if let Err(err) = self.view.recovery_completed(incarnation) {
            error!(incarnation, error = %err, "recovery completion failed");
            return Err(err.into());
        }
        *self.state.lock() = ControlState::Running;
        info!(incarnation, "control manager running");

        let restored = self.view.get_restored_not_in_view();
        if !restored.is_empty() {
            if let Err(err) = self.membership.publish_restored_not_in_view(&restored).await {
                warn!(servers = restored.len(), error = %err, "failed to publish restored servers");
            }
        }
        self.execute_pending_tasks().await;
        Ok(())
    }
}
