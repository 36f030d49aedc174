//! Integration tests for OperationDispatcher and ExecutionMonitor

mod common;

use common::fixtures::*;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use vm_console::errors::ConsoleError;
use vm_console::http::Method;
use vm_console::model::ExecutionState;
use vm_console::notify::Notification;
use vm_console::{
    ExecutionMonitor, JobStatus, Notifier, OperationDispatcher, PollRegistry, RemoteError,
    VmOperation,
};

const INTERVAL: Duration = Duration::from_millis(5000);

#[tokio::test]
async fn test_accepted_operation_is_notified() {
    let service = MockVmService::start().await;
    service.mock_execute("vm-1", "REBOOT").await;

    let notifier = Notifier::new();
    let mut notifications = notifier.subscribe();
    let dispatcher = OperationDispatcher::new(service.api(), notifier);

    let submission = dispatcher.execute("vm-1", VmOperation::Reboot).await.unwrap();

    assert_eq!(submission.vm_id, "vm-1");
    assert_eq!(submission.operation, VmOperation::Reboot);
    assert!(submission.task.is_none());
    assert_eq!(
        notifications.recv().await.unwrap(),
        Notification::OperationSubmitted {
            vm_id: "vm-1".to_string(),
            operation: VmOperation::Reboot,
        }
    );
}

#[tokio::test]
async fn test_rejected_operation_carries_status() {
    let service = MockVmService::start().await;
    service
        .mock_failure("POST", "service/vm/vm-1/execution/OFF", 400)
        .await;

    let notifier = Notifier::new();
    let mut notifications = notifier.subscribe();
    let dispatcher = OperationDispatcher::new(service.api(), notifier);

    let err = dispatcher.execute("vm-1", VmOperation::Off).await.unwrap_err();

    match err {
        ConsoleError::Remote(RemoteError::SubmissionFailed { status, .. }) => {
            assert_eq!(status, 400)
        }
        other => panic!("unexpected error: {:?}", other),
    }
    match notifications.recv().await.unwrap() {
        Notification::OperationFailed { operation, .. } => assert_eq!(operation, "OFF"),
        other => panic!("unexpected notification: {:?}", other),
    }
}

#[tokio::test]
async fn test_repeated_submissions_are_not_deduplicated() {
    let service = MockVmService::start().await;
    service.mock_execute("vm-1", "ON").await;
    let dispatcher = OperationDispatcher::new(service.api(), Notifier::new());

    dispatcher.execute("vm-1", VmOperation::On).await.unwrap();
    dispatcher.execute("vm-1", VmOperation::On).await.unwrap();

    assert_eq!(
        service.requests_to("POST", "service/vm/vm-1/execution/ON").await,
        2
    );
}

#[tokio::test(start_paused = true)]
async fn test_execution_tracked_until_finished() {
    let transport = ScriptedTransport::new();
    let status_path = "service/vm/vm-1/execution";
    transport
        .respond(Method::Get, status_path, execution_task("SHUTDOWN", false, false))
        .await;
    transport
        .respond(Method::Get, status_path, execution_task("SHUTDOWN", true, false))
        .await;
    transport
        .respond(
            Method::Get,
            "subscription/vm-1/configuration",
            json!({"configuration": {"schedules": [schedule_json(4, "ON", "0 0 7 * * ? *")]}}),
        )
        .await;

    let registry = PollRegistry::new(INTERVAL);
    let notifier = Notifier::new();
    let mut notifications = notifier.subscribe();
    let monitor = ExecutionMonitor::new(transport.api(), registry.clone(), notifier);

    monitor.track("vm-1").await;
    assert!(registry.is_active("execution-vm-1").await);

    sleep(INTERVAL + Duration::from_millis(100)).await;
    assert_eq!(
        monitor.status("vm-1").await,
        Some(JobStatus::Execution(ExecutionState::Running))
    );
    assert!(registry.is_active("execution-vm-1").await);

    sleep(INTERVAL).await;
    assert!(!registry.is_active("execution-vm-1").await);
    assert_eq!(
        monitor.status("vm-1").await,
        Some(JobStatus::Execution(ExecutionState::Finished))
    );
    assert_eq!(
        notifications.recv().await.unwrap(),
        Notification::ExecutionFinished {
            vm_id: "vm-1".to_string(),
            failed: false,
        }
    );
    assert_eq!(transport.count(Method::Get, status_path).await, 2);

    // Finished execution refreshes the VM configuration once
    assert_eq!(
        transport
            .count(Method::Get, "subscription/vm-1/configuration")
            .await,
        1
    );
    let configuration = monitor.configuration("vm-1").await.unwrap();
    assert_eq!(configuration.schedules.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_running_execution_does_not_refresh_configuration() {
    let transport = ScriptedTransport::new();
    transport
        .respond(
            Method::Get,
            "service/vm/vm-1/execution",
            execution_task("RESET", false, false),
        )
        .await;
    let registry = PollRegistry::new(INTERVAL);
    let monitor = ExecutionMonitor::new(transport.api(), registry.clone(), Notifier::new());

    monitor.track("vm-1").await;
    sleep(INTERVAL + Duration::from_millis(100)).await;

    assert!(registry.is_active("execution-vm-1").await);
    assert_eq!(
        transport
            .count(Method::Get, "subscription/vm-1/configuration")
            .await,
        0
    );
    assert!(monitor.configuration("vm-1").await.is_none());
    registry.stop_all().await;
}

#[tokio::test]
async fn test_no_execution_task_stops_tracking() {
    let transport = ScriptedTransport::new();
    let monitor = ExecutionMonitor::new(
        transport.api(),
        PollRegistry::new(INTERVAL),
        Notifier::new(),
    );

    assert_eq!(
        monitor.reconcile("vm-1", None).await,
        vm_console::PollDirective::Stop
    );
    assert!(monitor.latest("vm-1").await.is_none());
}
