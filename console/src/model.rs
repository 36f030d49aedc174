//! Wire and view types shared by the console components
//!
//! Field names follow the JSON bodies of the subscription REST API (camelCase,
//! dates as epoch milliseconds).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::keys;
use crate::cron_clock::CronClock;
use crate::errors::CronError;

/// Power operation that can be executed or scheduled against a VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VmOperation {
    /// Power off, without guest cooperation
    #[serde(alias = "off")]
    Off,
    /// Power on or resume
    #[serde(alias = "on")]
    On,
    /// Pause
    #[serde(alias = "suspend")]
    Suspend,
    /// Graceful stop, requires guest cooperation
    #[serde(alias = "shutdown")]
    Shutdown,
    /// Hard reset
    #[serde(alias = "reset")]
    Reset,
    /// Graceful restart, requires guest cooperation
    #[serde(alias = "reboot")]
    Reboot,
}

impl VmOperation {
    pub const ALL: [VmOperation; 6] = [
        VmOperation::Off,
        VmOperation::On,
        VmOperation::Suspend,
        VmOperation::Shutdown,
        VmOperation::Reset,
        VmOperation::Reboot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VmOperation::Off => "OFF",
            VmOperation::On => "ON",
            VmOperation::Suspend => "SUSPEND",
            VmOperation::Shutdown => "SHUTDOWN",
            VmOperation::Reset => "RESET",
            VmOperation::Reboot => "REBOOT",
        }
    }
}

impl fmt::Display for VmOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VmOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VmOperation::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown operation '{}', expected one of OFF, ON, SUSPEND, SHUTDOWN, RESET, REBOOT",
                    s
                )
            })
    }
}

/// Recurring operation attached to a VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Absent until the schedule is persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub operation: VmOperation,
    pub cron: String,
}

impl Schedule {
    pub fn new(operation: VmOperation, cron: impl Into<String>) -> Self {
        Self {
            id: None,
            operation,
            cron: cron.into(),
        }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    /// Next fire time, recomputed on every call
    pub fn next_fire(&self) -> Result<DateTime<Utc>, CronError> {
        CronClock::next_fire_time(&self.cron)
    }
}

/// VM part of a subscription configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmConfiguration {
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub support_snapshot: bool,
}

/// Body of `GET subscription/{id}/configuration`; other fields are ignored
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionConfiguration {
    #[serde(default)]
    pub configuration: VmConfiguration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SnapshotOperation {
    #[serde(alias = "create")]
    Create,
    #[serde(alias = "delete")]
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSnapshot {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// GiB
    #[serde(default)]
    pub size: u32,
}

/// Snapshot row as listed by `GET service/vm/{id}/snapshot`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub volumes: Vec<VolumeSnapshot>,
    #[serde(default)]
    pub available: bool,
    /// Available at provider side, not yet visible at client side
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub operation: Option<SnapshotOperation>,
    #[serde(default)]
    pub stop_requested: Option<bool>,
    #[serde(default)]
    pub status_text: Option<String>,
}

impl Snapshot {
    /// Not in a stable state: still being created or being deleted
    pub fn is_pending(&self) -> bool {
        self.pending || self.operation == Some(SnapshotOperation::Delete)
    }

    pub fn state(&self) -> SnapshotState {
        if self.operation == Some(SnapshotOperation::Delete) {
            SnapshotState::Deleting
        } else if self.pending {
            SnapshotState::Pending
        } else if self.available {
            SnapshotState::Available
        } else {
            SnapshotState::Failed
        }
    }
}

/// Snapshot task status, body of `GET service/vm/{id}/snapshot/task`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTask {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed: bool,
    /// Sole authority for stopping the poll
    #[serde(default)]
    pub finished_remote: bool,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub status_text: Option<String>,
    #[serde(default)]
    pub workload: u32,
    #[serde(default)]
    pub done: u32,
    #[serde(default)]
    pub stop: bool,
    /// Provider identifier of the snapshot, matches `Snapshot::id`
    #[serde(default)]
    pub snapshot_internal_id: Option<String>,
    #[serde(default)]
    pub operation: Option<SnapshotOperation>,
}

impl SnapshotTask {
    pub fn state(&self) -> SnapshotState {
        let deleting = self.operation == Some(SnapshotOperation::Delete);
        match (self.finished_remote, self.failed, deleting) {
            (_, true, _) => SnapshotState::Failed,
            (true, false, true) => SnapshotState::Deleted,
            (true, false, false) => SnapshotState::Available,
            (false, false, true) => SnapshotState::Deleting,
            (false, false, false) => SnapshotState::Pending,
        }
    }
}

/// Execution task status, body of `GET service/vm/{id}/execution`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTask {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub finished_remote: bool,
    #[serde(default)]
    pub operation: Option<VmOperation>,
}

impl ExecutionTask {
    pub fn state(&self) -> ExecutionState {
        if self.finished_remote {
            ExecutionState::Finished
        } else {
            ExecutionState::Running
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotState {
    Pending,
    Available,
    Failed,
    Deleting,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    Running,
    Finished,
}

/// Job status; the two domains have distinct terminal conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "status", rename_all = "lowercase")]
pub enum JobStatus {
    Snapshot(SnapshotState),
    Execution(ExecutionState),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        match self {
            JobStatus::Snapshot(state) => matches!(
                state,
                SnapshotState::Available | SnapshotState::Failed | SnapshotState::Deleted
            ),
            JobStatus::Execution(state) => *state == ExecutionState::Finished,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Snapshot,
    Execution,
}

impl JobKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            JobKind::Snapshot => keys::SNAPSHOT_PREFIX,
            JobKind::Execution => keys::EXECUTION_PREFIX,
        }
    }
}

/// Polling registry key: job kind plus owning VM
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub kind: JobKind,
    pub vm_id: String,
}

impl JobKey {
    pub fn snapshot(vm_id: impl Into<String>) -> Self {
        Self {
            kind: JobKind::Snapshot,
            vm_id: vm_id.into(),
        }
    }

    pub fn execution(vm_id: impl Into<String>) -> Self {
        Self {
            kind: JobKind::Execution,
            vm_id: vm_id.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.prefix(), self.vm_id)
    }
}
