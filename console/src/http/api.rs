use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use super::transport::{ApiRequest, Transport};
use crate::errors::RemoteError;
use crate::model::{
    ExecutionTask, Schedule, Snapshot, SnapshotTask, SubscriptionConfiguration, VmOperation,
};

/// Typed access to the VM endpoints of the subscription API
#[derive(Clone)]
pub struct VmApi {
    transport: Arc<dyn Transport>,
}

impl VmApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, RemoteError> {
        let path = request.path.clone();
        let value = self.transport.send(request).await?;
        decode(&path, value)
    }

    // === Executions ===

    #[instrument(skip(self))]
    pub async fn execute(
        &self,
        vm_id: &str,
        operation: VmOperation,
    ) -> Result<Option<ExecutionTask>, RemoteError> {
        self.call(ApiRequest::post(
            format!("service/vm/{}/execution/{}", vm_id, operation),
            None,
        ))
        .await
    }

    pub async fn execution_status(&self, vm_id: &str) -> Result<Option<ExecutionTask>, RemoteError> {
        self.call(ApiRequest::get(format!("service/vm/{}/execution", vm_id)))
            .await
    }

    // === Snapshots ===

    pub async fn snapshots(&self, vm_id: &str) -> Result<Vec<Snapshot>, RemoteError> {
        let snapshots: Option<Vec<Snapshot>> = self
            .call(ApiRequest::get(format!("service/vm/{}/snapshot", vm_id)))
            .await?;
        Ok(snapshots.unwrap_or_default())
    }

    #[instrument(skip(self))]
    pub async fn create_snapshot(
        &self,
        vm_id: &str,
        stop: bool,
    ) -> Result<Option<SnapshotTask>, RemoteError> {
        self.call(ApiRequest::post(
            format!("service/vm/{}/snapshot?stop={}", vm_id, stop),
            None,
        ))
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_snapshot(
        &self,
        vm_id: &str,
        snapshot_id: &str,
    ) -> Result<Option<SnapshotTask>, RemoteError> {
        self.call(ApiRequest::delete(format!(
            "service/vm/{}/snapshot/{}",
            vm_id, snapshot_id
        )))
        .await
    }

    #[instrument(skip(self))]
    pub async fn restore_snapshot(&self, vm_id: &str, snapshot_id: &str) -> Result<(), RemoteError> {
        let _: Value = self
            .call(ApiRequest::put(
                format!("service/vm/{}/snapshot/{}", vm_id, snapshot_id),
                None,
            ))
            .await?;
        Ok(())
    }

    pub async fn snapshot_task(&self, vm_id: &str) -> Result<Option<SnapshotTask>, RemoteError> {
        self.call(ApiRequest::get(format!("service/vm/{}/snapshot/task", vm_id)))
            .await
    }

    // === Reports ===

    /// Execution history of the VM, CSV
    #[instrument(skip(self))]
    pub async fn execution_report(&self, vm_id: &str) -> Result<String, RemoteError> {
        self.transport
            .download(&format!(
                "service/vm/{}/execution/{}",
                vm_id,
                execution_report_name(vm_id)
            ))
            .await
    }

    /// Schedules of every visible VM of a node, with their last execution, CSV
    #[instrument(skip(self))]
    pub async fn schedules_report(&self, node_id: &str) -> Result<String, RemoteError> {
        self.transport
            .download(&format!(
                "service/vm/{}/{}",
                node_id,
                schedules_report_name(node_id)
            ))
            .await
    }

    // === Configuration and schedules ===

    pub async fn configuration(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionConfiguration, RemoteError> {
        let configuration: Option<SubscriptionConfiguration> = self
            .call(ApiRequest::get(format!(
                "subscription/{}/configuration",
                subscription_id
            )))
            .await?;
        Ok(configuration.unwrap_or_default())
    }

    /// Returns the identifier assigned by the server
    #[instrument(skip(self))]
    pub async fn create_schedule(&self, vm_id: &str, schedule: &Schedule) -> Result<u32, RemoteError> {
        let path = format!("service/vm/{}/schedule", vm_id);
        self.call(ApiRequest::post(path, Some(encode(schedule)?))).await
    }

    #[instrument(skip(self))]
    pub async fn update_schedule(&self, vm_id: &str, schedule: &Schedule) -> Result<(), RemoteError> {
        let path = format!("service/vm/{}/schedule", vm_id);
        let _: Value = self.call(ApiRequest::put(path, Some(encode(schedule)?))).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_schedule(&self, vm_id: &str, schedule_id: u32) -> Result<(), RemoteError> {
        let _: Value = self
            .call(ApiRequest::delete(format!(
                "service/vm/{}/schedule/{}",
                vm_id, schedule_id
            )))
            .await?;
        Ok(())
    }
}

pub fn execution_report_name(vm_id: &str) -> String {
    format!("executions-{}.csv", vm_id)
}

/// Node identifiers such as `service:vm:vcloud` become `service-vm-vcloud`
pub fn schedules_report_name(node_id: &str) -> String {
    format!("schedules-{}.csv", node_id.replace(':', "-"))
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value).map_err(|e| RemoteError::InvalidResponse {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn encode(schedule: &Schedule) -> Result<Value, RemoteError> {
    serde_json::to_value(schedule).map_err(|e| RemoteError::InvalidResponse {
        path: "schedule".to_string(),
        reason: e.to_string(),
    })
}
