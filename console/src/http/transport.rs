use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use crate::config::ConsoleConfig;
use crate::errors::RemoteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One JSON call, `path` relative to the REST root
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body,
        }
    }

    pub fn put(path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// Generic request/response call with JSON bodies.
///
/// An empty response body is returned as `Value::Null`. `download` returns
/// the body untouched, for file exports such as CSV reports.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value, RemoteError>;

    async fn download(&self, path: &str) -> Result<String, RemoteError>;
}

pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &ConsoleConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| RemoteError::ConnectionFailed {
                url: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Run the request and return the body of a successful response
    async fn exchange(&self, request: &ApiRequest, accept: &str) -> Result<String, RemoteError> {
        let url = self.url(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .header("Accept", accept);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::ConnectionFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!("{} {} failed with status {}", request.method, url, status);
            return Err(RemoteError::SubmissionFailed {
                method: request.method.to_string(),
                path: request.path.clone(),
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, RemoteError> {
        let text = self.exchange(&request, "application/json").await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| RemoteError::InvalidResponse {
            path: request.path,
            reason: e.to_string(),
        })
    }

    async fn download(&self, path: &str) -> Result<String, RemoteError> {
        self.exchange(&ApiRequest::get(path), "application/octet-stream")
            .await
    }
}
