//! Common JSON payloads, in the shape the server sends them

use serde_json::{json, Value};

pub fn schedule_json(id: u32, operation: &str, cron: &str) -> Value {
    json!({ "id": id, "operation": operation, "cron": cron })
}

pub fn available_snapshot(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "date": 1709287200000_i64,
        "available": true,
        "pending": false,
        "volumes": [{ "id": format!("vol-{}", id), "size": 8 }]
    })
}

pub fn pending_snapshot(id: &str) -> Value {
    json!({
        "id": id,
        "available": false,
        "pending": true,
        "volumes": []
    })
}

pub fn running_task(internal_id: &str, phase: &str, operation: &str) -> Value {
    json!({
        "id": 1,
        "start": 1709287200000_i64,
        "finishedRemote": false,
        "failed": false,
        "phase": phase,
        "statusText": format!("{}-in-progress", phase),
        "workload": 4,
        "done": 1,
        "snapshotInternalId": internal_id,
        "operation": operation
    })
}

pub fn finished_task(internal_id: &str, operation: &str, failed: bool) -> Value {
    json!({
        "id": 1,
        "start": 1709287200000_i64,
        "end": 1709287260000_i64,
        "finishedRemote": true,
        "failed": failed,
        "snapshotInternalId": internal_id,
        "operation": operation
    })
}

pub fn execution_task(operation: &str, finished: bool, failed: bool) -> Value {
    json!({
        "id": 3,
        "start": 1709287200000_i64,
        "finishedRemote": finished,
        "failed": failed,
        "operation": operation
    })
}
