//! Toast-style notifications for the surrounding UI
//!
//! Submission outcomes (success and failure) and terminal job states go
//! through one broadcast channel. Individual poll failures never do.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::constants::defaults;
use crate::model::VmOperation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    ScheduleSaved {
        vm_id: String,
        schedule_id: u32,
        operation: VmOperation,
        created: bool,
    },
    ScheduleDeleted {
        vm_id: String,
        schedule_id: u32,
    },
    OperationSubmitted {
        vm_id: String,
        operation: VmOperation,
    },
    OperationFailed {
        vm_id: String,
        operation: String,
        reason: String,
    },
    SnapshotRequested {
        vm_id: String,
        stop: bool,
    },
    SnapshotDeleted {
        vm_id: String,
        snapshot_id: String,
    },
    SnapshotRestoring {
        vm_id: String,
        snapshot_id: String,
    },
    SnapshotFinished {
        vm_id: String,
        failed: bool,
    },
    ExecutionFinished {
        vm_id: String,
        failed: bool,
    },
}

#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(defaults::NOTIFICATION_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Publish to the current subscribers; dropped when nobody listens
    pub fn notify(&self, notification: Notification) {
        debug!("Notification: {:?}", notification);
        let _ = self.sender.send(notification);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_notifications() {
        let notifier = Notifier::new();
        let mut receiver = notifier.subscribe();

        notifier.notify(Notification::SnapshotFinished {
            vm_id: "vm-1".to_string(),
            failed: false,
        });

        assert_eq!(
            receiver.recv().await.unwrap(),
            Notification::SnapshotFinished {
                vm_id: "vm-1".to_string(),
                failed: false,
            }
        );
    }

    #[test]
    fn test_notify_without_subscriber_is_silent() {
        let notifier = Notifier::new();
        notifier.notify(Notification::ScheduleDeleted {
            vm_id: "vm-1".to_string(),
            schedule_id: 7,
        });
    }
}
