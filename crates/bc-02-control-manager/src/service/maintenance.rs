use super::core::{ControlManager, ControlState};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

impl ControlManager {
    /// Release deleted server indices whose grace period elapsed.
    pub fn sweep_deleted(&self) -> usize {
        self.view.sweep_deleted()
    }

    /// Run the maintenance loop on the current tokio runtime.
    pub fn spawn_maintenance(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.run_maintenance().await })
    }

    /// GC sweep, forwarding signal delivery and statistics pull until closed.
    pub async fn run_maintenance(&self) {
        let mut gc = tokio::time::interval(self.config.gc_interval);
        gc.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut statistics = tokio::time::interval(self.config.engine_statistics_interval);
        statistics.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if self.state() == ControlState::Closed {
                break;
            }
            tokio::select! {
                _ = gc.tick() => {
                    let freed = self.sweep_deleted();
                    if freed > 0 {
                        debug!(freed, "deleted servers swept");
                    }
                    self.execute_pending_tasks().await;
                }
                _ = self.wakeup.notified() => {
                    self.drain_view_notifications();
                }
                _ = statistics.tick() => {
                    if self.state() == ControlState::Running {
                        match self.report_engine_statistics() {
                            Ok(stats) => debug!(
                                forwarded_in = stats.forwarded_in,
                                no_consumer = stats.forwarded_in_no_consumer,
                                retained = stats.forwarded_in_retained,
                                "engine statistics"
                            ),
                            Err(err) => debug!(error = %err, "engine statistics unavailable"),
                        }
                    }
                }
            }
        }
        info!("maintenance loop stopped");
    }
}
