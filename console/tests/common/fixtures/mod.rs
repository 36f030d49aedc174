//! Reusable test utilities:
//! - Mock subscription service (wiremock)
//! - Scripted in-memory transport for deterministic polling tests
//! - Test configuration builder
//! - Common JSON payloads

// Each test binary uses a different subset of the fixtures
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod mock_vm_service;
pub mod scripted_transport;
pub mod test_config;
pub mod test_data;

pub use mock_vm_service::MockVmService;
pub use scripted_transport::ScriptedTransport;
pub use test_config::TestConfigBuilder;
pub use test_data::*;
