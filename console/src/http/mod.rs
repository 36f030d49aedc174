//! Remote access to the subscription REST API
//!
//! `Transport` is the generic JSON request/response seam; `HttpTransport`
//! implements it over reqwest. `VmApi` maps every endpoint the console uses
//! onto a typed method.

pub mod api;
pub mod transport;

pub use api::VmApi;
pub use transport::{ApiRequest, HttpTransport, Method, Transport};
