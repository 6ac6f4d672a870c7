use super::core::ControlManager;
use bc_01_cluster_view::ViewTask;
use bc_telemetry::log_server_event;
use tracing::warn;

const COMPONENT: &str = "control";

impl ControlManager {
    /// Run every task the view has queued, including tasks queued while
    /// running them. Returns how many ran.
    pub async fn execute_pending_tasks(&self) -> usize {
        let _serial = self.task_lock.lock().await;
        let mut executed = 0;
        loop {
            let tasks = self.view.take_pending_tasks();
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                self.execute_task(task).await;
                executed += 1;
            }
        }
        executed
    }

    async fn execute_task(&self, task: ViewTask) {
        match task {
            ViewTask::PublishRemovedServers(removed) => {
                if let Err(err) = self.membership.publish_removed_servers(&removed).await {
                    warn!(entries = removed.len(), error = %err, "failed to publish removed servers");
                }
            }
            ViewTask::DeleteRemovedServers(pending) => {
                for (uid, incarnation) in pending {
                    match self.view.admin_delete_node_by_uid(&uid, incarnation) {
                        Ok(true) => {
                            log_server_event!(info, COMPONENT, "removed server deleted", uid, incarnation)
                        }
                        Ok(false) => log_server_event!(
                            debug,
                            COMPONENT,
                            "removed server already gone",
                            uid,
                            incarnation
                        ),
                        Err(err) => log_server_event!(
                            warn,
                            COMPONENT,
                            "removed server delete failed",
                            uid,
                            incarnation,
                            error = %err
                        ),
                    }
                }
            }
            ViewTask::RequestFreshBase { uid, kind } => {
                if let Err(err) = self.membership.request_fresh_base(&uid, kind).await {
                    warn!(%uid, %kind, error = %err, "fresh base request failed");
                }
            }
            ViewTask::ClearRetainedAttributes { uid, incarnation } => {
                match self.membership.clear_retained_attributes(&uid, incarnation).await {
                    Ok(true) => log_server_event!(
                        debug,
                        COMPONENT,
                        "retained attributes cleared",
                        uid,
                        incarnation
                    ),
                    Ok(false) => log_server_event!(
                        warn,
                        COMPONENT,
                        "retained attributes kept, server still alive",
                        uid,
                        incarnation
                    ),
                    Err(err) => log_server_event!(
                        warn,
                        COMPONENT,
                        "clear retained attributes failed",
                        uid,
                        incarnation,
                        error = %err
                    ),
                }
            }
        }
    }
}
