//! Mock subscription service for testing
//!
//! Serves the VM endpoints under `/rest` so that a real `HttpTransport`
//! can be pointed at it.

use serde_json::{json, Value};
use std::sync::Arc;
use vm_console::{ConsoleConfig, HttpTransport, VmApi};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub struct MockVmService {
    pub server: MockServer,
    pub base_url: String,
}

impl MockVmService {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = format!("{}/rest", server.uri());
        Self { server, base_url }
    }

    pub fn config(&self) -> ConsoleConfig {
        ConsoleConfig::new(self.base_url.clone())
    }

    /// API client backed by a real HTTP transport
    pub fn api(&self) -> VmApi {
        let transport = HttpTransport::new(&self.config()).expect("Failed to create transport");
        VmApi::new(Arc::new(transport))
    }

    /// Configuration with the given schedules, answered for the next request only
    pub async fn mock_configuration_once(&self, vm_id: &str, schedules: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/rest/subscription/{}/configuration", vm_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(configuration(schedules)))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    /// Configuration answered for every remaining request
    pub async fn mock_configuration(&self, vm_id: &str, schedules: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/rest/subscription/{}/configuration", vm_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(configuration(schedules)))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_schedule_create(&self, vm_id: &str, new_id: u32) {
        Mock::given(method("POST"))
            .and(path(format!("/rest/service/vm/{}/schedule", vm_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(new_id)))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_schedule_update(&self, vm_id: &str) {
        Mock::given(method("PUT"))
            .and(path(format!("/rest/service/vm/{}/schedule", vm_id)))
            .respond_with(ResponseTemplate::new(204))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_schedule_delete(&self, vm_id: &str, schedule_id: u32) {
        Mock::given(method("DELETE"))
            .and(path(format!("/rest/service/vm/{}/schedule/{}", vm_id, schedule_id)))
            .respond_with(ResponseTemplate::new(204))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_execute(&self, vm_id: &str, operation: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/rest/service/vm/{}/execution/{}", vm_id, operation)))
            .respond_with(ResponseTemplate::new(204))
            .mount(&self.server)
            .await;
    }

    /// CSV body served as a file download
    pub async fn mock_report(&self, request_path: &str, csv: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/rest/{}", request_path)))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/octet-stream")
                    .set_body_string(csv),
            )
            .mount(&self.server)
            .await;
    }

    /// Reject any request on the given method and path
    pub async fn mock_failure(&self, http_method: &str, request_path: &str, status: u16) {
        Mock::given(method(http_method))
            .and(path(format!("/rest/{}", request_path.trim_start_matches('/'))))
            .respond_with(ResponseTemplate::new(status).set_body_string("rejected"))
            .mount(&self.server)
            .await;
    }

    /// Number of received requests matching the method and path (without query)
    pub async fn requests_to(&self, http_method: &str, request_path: &str) -> usize {
        let expected = format!("/rest/{}", request_path.trim_start_matches('/'));
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == http_method && r.url.path() == expected)
            .count()
    }

    pub async fn total_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

fn configuration(schedules: Value) -> Value {
    json!({
        "configuration": {
            "schedules": schedules,
            "supportSnapshot": true
        }
    })
}
