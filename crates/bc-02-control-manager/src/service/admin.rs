use super::core::{ControlManager, ControlState, StatisticsSample};
use crate::error::ControlResult;
use bc_01_cluster_view::{ClusterStatistics, ClusterView, EngineStatistics, RemoteServerHandle};
use tokio::time::Instant;
use tracing::{info, warn};

/// Result of leaving the cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetachOutcome {
    /// The cluster acknowledged the leave
    Acknowledged,
    /// No acknowledgment within `detach_timeout`; expected when the local
    /// server was the last member
    NoAcknowledgment,
}

impl ControlManager {
    /// Remove a remote server from the cluster view.
    ///
    /// The membership layer is then asked to drop the server's retained
    /// attributes; a refusal because the server is still alive is logged.
    pub async fn admin_delete_node(&self, handle: RemoteServerHandle) -> ControlResult<()> {
        self.require_state("admin_delete_node", &[ControlState::Running])?;
        self.view.admin_delete_node(handle)?;
        self.execute_pending_tasks().await;
        Ok(())
    }

    /// Leave the cluster and wait, bounded by `detach_timeout`, for the
    /// acknowledgment.
    ///
    /// Events are ignored from the moment this is called. A second call
    /// returns `NotAvailable` without waiting.
    pub async fn admin_detach_from_cluster(&self) -> ControlResult<DetachOutcome> {
        {
            let mut state = self.state.lock();
            if !state.accepts_events() {
                return Err(crate::error::ControlError::NotAvailable {
                    operation: "admin_detach_from_cluster",
                    state: state.to_string(),
                });
            }
            *state = ControlState::Detached;
        }
        info!(timeout_ms = self.config.detach_timeout.as_millis() as u64, "detaching from cluster");

        match tokio::time::timeout(self.config.detach_timeout, self.membership.leave_cluster()).await
        {
            Ok(Ok(())) => {
                info!("cluster acknowledged detach");
                Ok(DetachOutcome::Acknowledged)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "detach failed");
                Err(err)
            }
            Err(_) => {
                warn!("no acknowledgment received from cluster, expected if this was the last server");
                Ok(DetachOutcome::NoAcknowledgment)
            }
        }
    }

    pub fn get_view(&self) -> ClusterView {
        self.view.get_view()
    }

    pub fn get_statistics(&self) -> ClusterStatistics {
        self.view.get_statistics()
    }

    /// Engine forwarding statistics, pulled at most once per
    /// `engine_statistics_interval`.
    pub fn report_engine_statistics(&self) -> ControlResult<EngineStatistics> {
        let now = Instant::now();
        let mut cached = self.statistics.lock();
        if let Some(sample) = cached.as_ref() {
            if now.duration_since(sample.taken_at) < self.config.engine_statistics_interval {
                return Ok(sample.statistics);
            }
        }
        let statistics = self.view.report_engine_statistics()?;
        *cached = Some(StatisticsSample {
            taken_at: now,
            statistics,
        });
        Ok(statistics)
    }

    /// Terminate forwarding and the engine.
    pub fn notify_term(&self) {
        self.view.notify_term();
    }

    /// Stop the control manager and the view. The maintenance loop exits.
    pub fn close(&self) {
        *self.state.lock() = ControlState::Closed;
        self.view.close();
        self.wakeup.notify_one();
        info!("control manager closed");
    }
}
