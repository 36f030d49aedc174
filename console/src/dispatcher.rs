//! One-shot power operations
//!
//! Submission is fire-and-forget: the remote side accepts the request and runs
//! it. Completion is not tracked here (see `ExecutionMonitor`), and concurrent
//! submissions for the same VM are not deduplicated; the caller disables its
//! trigger while a call is outstanding.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::errors::Result;
use crate::http::VmApi;
use crate::model::{ExecutionTask, VmOperation};
use crate::notify::{Notification, Notifier};

/// Acknowledgment of an accepted operation
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub vm_id: String,
    pub operation: VmOperation,
    pub submitted_at: DateTime<Utc>,
    /// Execution task created by the server, when it returned one
    pub task: Option<ExecutionTask>,
}

#[derive(Clone)]
pub struct OperationDispatcher {
    api: VmApi,
    notifier: Notifier,
}

impl OperationDispatcher {
    pub fn new(api: VmApi, notifier: Notifier) -> Self {
        Self { api, notifier }
    }

    #[instrument(skip(self))]
    pub async fn execute(&self, vm_id: &str, operation: VmOperation) -> Result<Submission> {
        match self.api.execute(vm_id, operation).await {
            Ok(task) => {
                info!("Operation {} accepted for {}", operation, vm_id);
                self.notifier.notify(Notification::OperationSubmitted {
                    vm_id: vm_id.to_string(),
                    operation,
                });
                Ok(Submission {
                    vm_id: vm_id.to_string(),
                    operation,
                    submitted_at: Utc::now(),
                    task,
                })
            }
            Err(e) => {
                error!("Operation {} rejected for {}: {}", operation, vm_id, e);
                self.notifier.notify(Notification::OperationFailed {
                    vm_id: vm_id.to_string(),
                    operation: operation.to_string(),
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }
}
