use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use super::table::SnapshotTable;
use crate::errors::Result;
use crate::http::VmApi;
use crate::model::{JobKey, JobStatus, Snapshot, SnapshotOperation, SnapshotState, SnapshotTask};
use crate::notify::{Notification, Notifier};
use crate::poller::{PollDirective, PollRegistry};

/// Progress of the running snapshot job, for a tooltip or badge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotProgress {
    pub state: SnapshotState,
    pub phase: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub internal_reference: Option<String>,
    pub done: u32,
    pub workload: u32,
}

impl From<&SnapshotTask> for SnapshotProgress {
    fn from(task: &SnapshotTask) -> Self {
        Self {
            state: task.state(),
            phase: task.phase.clone(),
            start: task.start,
            internal_reference: task.snapshot_internal_id.clone(),
            done: task.done,
            workload: task.workload,
        }
    }
}

impl fmt::Display for SnapshotProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Phase: {}", self.phase.as_deref().unwrap_or("-"))?;
        if let Some(start) = self.start {
            write!(f, ", Started: {}", start.format("%Y-%m-%d %H:%M:%S"))?;
        }
        if let Some(reference) = &self.internal_reference {
            write!(f, ", Internal reference: {}", reference)?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SnapshotLifecycle {
    vm_id: String,
    api: VmApi,
    registry: PollRegistry,
    notifier: Notifier,
    table: SnapshotTable,
    progress: Arc<RwLock<Option<SnapshotProgress>>>,
    last_outcome: Arc<RwLock<Option<JobStatus>>>,
}

impl SnapshotLifecycle {
    pub fn new(
        vm_id: impl Into<String>,
        api: VmApi,
        registry: PollRegistry,
        notifier: Notifier,
    ) -> Self {
        Self {
            vm_id: vm_id.into(),
            api,
            registry,
            notifier,
            table: SnapshotTable::new(),
            progress: Arc::new(RwLock::new(None)),
            last_outcome: Arc::new(RwLock::new(None)),
        }
    }

    pub fn vm_id(&self) -> &str {
        &self.vm_id
    }

    pub fn key(&self) -> JobKey {
        JobKey::snapshot(self.vm_id.clone())
    }

    pub fn table(&self) -> &SnapshotTable {
        &self.table
    }

    pub async fn progress(&self) -> Option<SnapshotProgress> {
        self.progress.read().await.clone()
    }

    /// Terminal status of the last job that finished
    pub async fn last_outcome(&self) -> Option<JobStatus> {
        *self.last_outcome.read().await
    }

    pub async fn is_polling(&self) -> bool {
        self.registry.is_active(&self.key().to_string()).await
    }

    /// Load the list, and resume polling when a row is still pending
    #[instrument(skip(self), fields(vm = %self.vm_id))]
    pub async fn load(&self) -> Result<Vec<Snapshot>> {
        self.reload().await?;
        if self.table.has_pending().await {
            info!("Pending snapshot found for {}, tracking it", self.vm_id);
            self.start_polling().await;
        }
        Ok(self.table.snapshots().await)
    }

    pub async fn reload(&self) -> Result<()> {
        let snapshots = self.api.snapshots(&self.vm_id).await?;
        self.table.replace_all(snapshots).await;
        Ok(())
    }

    /// Submit a snapshot creation and start tracking it.
    ///
    /// The returned row is pending and already displayed.
    #[instrument(skip(self), fields(vm = %self.vm_id))]
    pub async fn create(&self, stop: bool) -> Result<Snapshot> {
        let task = match self.api.create_snapshot(&self.vm_id, stop).await {
            Ok(task) => task.unwrap_or_default(),
            Err(e) => {
                error!("Snapshot creation rejected for {}: {}", self.vm_id, e);
                self.notifier.notify(Notification::OperationFailed {
                    vm_id: self.vm_id.clone(),
                    operation: "snapshot-create".to_string(),
                    reason: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let pending = Snapshot {
            id: task.snapshot_internal_id.clone(),
            pending: true,
            operation: Some(SnapshotOperation::Create),
            stop_requested: Some(stop),
            status_text: task.status_text.clone(),
            ..Default::default()
        };
        self.table.insert_pending(pending.clone()).await;
        *self.progress.write().await = Some(SnapshotProgress::from(&task));

        self.notifier.notify(Notification::SnapshotRequested {
            vm_id: self.vm_id.clone(),
            stop,
        });
        self.start_polling().await;
        info!("Snapshot requested for {} (stop: {})", self.vm_id, stop);
        Ok(pending)
    }

    /// Delete a snapshot, showing it as deleting before the server answers.
    ///
    /// When the request is rejected the row is restored and no poll starts.
    #[instrument(skip(self), fields(vm = %self.vm_id))]
    pub async fn delete(&self, snapshot_id: &str) -> Result<()> {
        if !self.table.mark_deleting(snapshot_id).await {
            debug!("Snapshot {} is not displayed, deleting anyway", snapshot_id);
        }

        match self.api.delete_snapshot(&self.vm_id, snapshot_id).await {
            Ok(task) => {
                if let Some(task) = task {
                    *self.progress.write().await = Some(SnapshotProgress::from(&task));
                }
                self.notifier.notify(Notification::SnapshotDeleted {
                    vm_id: self.vm_id.clone(),
                    snapshot_id: snapshot_id.to_string(),
                });
                self.start_polling().await;
                Ok(())
            }
            Err(e) => {
                self.table.rollback(snapshot_id).await;
                error!("Deletion of snapshot {} rejected: {}", snapshot_id, e);
                self.notifier.notify(Notification::OperationFailed {
                    vm_id: self.vm_id.clone(),
                    operation: "snapshot-delete".to_string(),
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Restore the VM from a snapshot, then reload the list
    #[instrument(skip(self), fields(vm = %self.vm_id))]
    pub async fn restore(&self, snapshot_id: &str) -> Result<()> {
        if let Err(e) = self.api.restore_snapshot(&self.vm_id, snapshot_id).await {
            self.notifier.notify(Notification::OperationFailed {
                vm_id: self.vm_id.clone(),
                operation: "snapshot-restore".to_string(),
                reason: e.to_string(),
            });
            return Err(e.into());
        }
        self.notifier.notify(Notification::SnapshotRestoring {
            vm_id: self.vm_id.clone(),
            snapshot_id: snapshot_id.to_string(),
        });
        self.reload().await
    }

    /// One poll tick: fetch the task status and reconcile it
    pub async fn synchronize(&self) -> Result<PollDirective> {
        let task = self.api.snapshot_task(&self.vm_id).await?;
        self.reconcile(task).await
    }

    /// Out-of-band tick: synchronize now, and unregister the poll when the
    /// job is already terminal so that no extra tick runs.
    pub async fn check_now(&self) -> Result<PollDirective> {
        let directive = self.synchronize().await?;
        if directive == PollDirective::Stop && self.registry.stop(&self.key().to_string()).await {
            debug!("Poll for {} stopped by an immediate check", self.vm_id);
        }
        Ok(directive)
    }

    /// Merge a task status into the displayed list.
    ///
    /// Terminal status: full reload, outcome recorded and notified, `Stop`.
    /// Otherwise the row matching `snapshotInternalId` is patched in place, or
    /// the list is reloaded when none matches, and polling continues.
    pub async fn reconcile(&self, task: Option<SnapshotTask>) -> Result<PollDirective> {
        let Some(task) = task else {
            info!("No snapshot task left for {}, reloading", self.vm_id);
            self.reload_after_terminal().await;
            *self.progress.write().await = None;
            return Ok(PollDirective::Stop);
        };

        if task.finished_remote {
            self.reload_after_terminal().await;
            let status = JobStatus::Snapshot(task.state());
            *self.last_outcome.write().await = Some(status);
            *self.progress.write().await = None;
            if task.failed {
                warn!("Snapshot job for {} failed", self.vm_id);
            } else {
                info!("Snapshot job for {} finished: {:?}", self.vm_id, status);
            }
            self.notifier.notify(Notification::SnapshotFinished {
                vm_id: self.vm_id.clone(),
                failed: task.failed,
            });
            return Ok(PollDirective::Stop);
        }

        *self.progress.write().await = Some(SnapshotProgress::from(&task));

        let patched = match task.snapshot_internal_id.as_deref() {
            Some(remote_id) => {
                self.table
                    .patch(remote_id, |snapshot| {
                        snapshot.operation = task.operation;
                        snapshot.status_text = task.status_text.clone();
                    })
                    .await
            }
            None => false,
        };

        if !patched {
            debug!("No displayed row for the {} task, reloading", self.vm_id);
            self.reload().await?;
        }
        Ok(PollDirective::Continue)
    }

    async fn reload_after_terminal(&self) {
        if let Err(e) = self.reload().await {
            warn!("Reload after terminal status failed for {}: {}", self.vm_id, e);
        }
    }

    async fn start_polling(&self) {
        let lifecycle = self.clone();
        self.registry
            .start(self.key().to_string(), move || {
                let lifecycle = lifecycle.clone();
                async move { lifecycle.synchronize().await }
            })
            .await;
    }
}
