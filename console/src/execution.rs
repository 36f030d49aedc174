//! Execution status tracking
//!
//! After a power operation is accepted, `ExecutionMonitor::track` polls the
//! VM execution status under `execution-{vm}` until the remote side reports
//! `finishedRemote`. A finished execution refreshes the VM configuration,
//! since the power state and schedules shown for the VM may have changed.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::errors::Result;
use crate::http::VmApi;
use crate::model::{ExecutionTask, JobKey, JobStatus, VmConfiguration};
use crate::notify::{Notification, Notifier};
use crate::poller::{PollDirective, PollRegistry};

#[derive(Clone)]
pub struct ExecutionMonitor {
    api: VmApi,
    registry: PollRegistry,
    notifier: Notifier,
    latest: Arc<RwLock<HashMap<String, ExecutionTask>>>,
    configurations: Arc<RwLock<HashMap<String, VmConfiguration>>>,
}

impl ExecutionMonitor {
    pub fn new(api: VmApi, registry: PollRegistry, notifier: Notifier) -> Self {
        Self {
            api,
            registry,
            notifier,
            latest: Arc::new(RwLock::new(HashMap::new())),
            configurations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start polling the execution status of `vm_id`, replacing any running poll
    #[instrument(skip(self))]
    pub async fn track(&self, vm_id: &str) {
        let monitor = self.clone();
        let vm = vm_id.to_string();
        self.registry
            .start(JobKey::execution(vm_id).to_string(), move || {
                let monitor = monitor.clone();
                let vm = vm.clone();
                async move { monitor.synchronize(&vm).await }
            })
            .await;
    }

    pub async fn synchronize(&self, vm_id: &str) -> Result<PollDirective> {
        let task = self.api.execution_status(vm_id).await?;
        Ok(self.reconcile(vm_id, task).await)
    }

    pub async fn reconcile(&self, vm_id: &str, task: Option<ExecutionTask>) -> PollDirective {
        let Some(task) = task else {
            info!("No execution task for {}", vm_id);
            return PollDirective::Stop;
        };

        let finished = task.finished_remote;
        let failed = task.failed;
        self.latest.write().await.insert(vm_id.to_string(), task);
        if !finished {
            return PollDirective::Continue;
        }

        if failed {
            warn!("Execution on {} failed", vm_id);
        } else {
            info!("Execution on {} finished", vm_id);
        }
        self.refresh_configuration(vm_id).await;
        self.notifier.notify(Notification::ExecutionFinished {
            vm_id: vm_id.to_string(),
            failed,
        });
        PollDirective::Stop
    }

    pub async fn latest(&self, vm_id: &str) -> Option<ExecutionTask> {
        self.latest.read().await.get(vm_id).cloned()
    }

    /// Configuration fetched after the last finished execution
    pub async fn configuration(&self, vm_id: &str) -> Option<VmConfiguration> {
        self.configurations.read().await.get(vm_id).cloned()
    }

    async fn refresh_configuration(&self, vm_id: &str) {
        match self.api.configuration(vm_id).await {
            Ok(subscription) => {
                self.configurations
                    .write()
                    .await
                    .insert(vm_id.to_string(), subscription.configuration);
            }
            Err(e) => warn!("Refresh of {} after execution failed: {}", vm_id, e),
        }
    }

    pub async fn status(&self, vm_id: &str) -> Option<JobStatus> {
        self.latest(vm_id)
            .await
            .map(|task| JobStatus::Execution(task.state()))
    }
}
