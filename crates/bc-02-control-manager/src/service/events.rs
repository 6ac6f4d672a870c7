use super::core::{ControlManager, ViewNotification};
use crate::error::ControlResult;
use bc_01_cluster_view::{MembershipEvent, RemoteServerHandle};
use tracing::{debug, error, warn};

impl ControlManager {
    /// Deliver one membership event to the view and run the resulting tasks.
    ///
    /// Non-fatal view errors are logged and absorbed. A fatal one requests
    /// maintenance mode and is returned.
    pub async fn on_membership_event(&self, event: MembershipEvent) -> ControlResult<()> {
        let state = self.state();
        if !state.accepts_events() {
            debug!(event = event.name(), %state, "membership event ignored");
            return Ok(());
        }
        let name = event.name();
        if let Err(err) = self.view.on_membership_event(event) {
            if err.is_fatal() {
                error!(event = name, error = %err, "fatal membership event");
                self.fatal.request_maintenance_mode(&err);
                return Err(err.into());
            }
            warn!(event = name, error = %err, "membership event partially applied");
        }
        self.execute_pending_tasks().await;
        Ok(())
    }

    /// Queue a forwarding connect signal.
    pub fn node_forwarding_connected(&self, handle: RemoteServerHandle) {
        self.enqueue(ViewNotification::Connected(handle));
    }

    /// Queue a forwarding disconnect signal.
    pub fn node_forwarding_disconnected(&self, handle: RemoteServerHandle) {
        self.enqueue(ViewNotification::Disconnected(handle));
    }

    fn enqueue(&self, notification: ViewNotification) {
        self.notifications.lock().push_back(notification);
        self.wakeup.notify_one();
    }

    pub fn pending_notifications(&self) -> usize {
        self.notifications.lock().len()
    }

    /// Deliver queued forwarding signals in arrival order.
    ///
    /// Returns the number delivered.
    pub fn drain_view_notifications(&self) -> usize {
        let _drain = self.drain_lock.lock();
        let mut delivered = 0;
        loop {
            let Some(notification) = self.notifications.lock().pop_front() else {
                break;
            };
            let result = match notification {
                ViewNotification::Connected(handle) => self.view.node_forwarding_connected(handle),
                ViewNotification::Disconnected(handle) => {
                    self.view.node_forwarding_disconnected(handle)
                }
            };
            if let Err(err) = result {
                warn!(?notification, error = %err, "forwarding signal failed");
            }
            delivered += 1;
        }
        delivered
    }
}
