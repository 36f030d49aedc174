//! In-memory transport answering from a script
//!
//! Responses are queued per method and path. The last queued response of a
//! route is sticky, so a route answers the same thing until re-scripted.
//! Unscripted routes fail with a 404. Downloads answer the scripted
//! string body of a GET route.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use vm_console::http::{ApiRequest, Method, Transport};
use vm_console::{RemoteError, VmApi};

type Route = (Method, String);

#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<Route, VecDeque<Result<Value, RemoteError>>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn api(self: &Arc<Self>) -> VmApi {
        VmApi::new(self.clone())
    }

    /// Queue a successful response
    pub async fn respond(&self, method: Method, path: &str, body: Value) {
        self.push(method, path, Ok(body)).await;
    }

    /// Queue a rejection with the given HTTP status
    pub async fn fail(&self, method: Method, path: &str, status: u16) {
        let error = RemoteError::SubmissionFailed {
            method: method.to_string(),
            path: path.to_string(),
            status,
            message: "rejected".to_string(),
        };
        self.push(method, path, Err(error)).await;
    }

    /// Drop what is queued on a route and answer `body` from now on
    pub async fn replace(&self, method: Method, path: &str, body: Value) {
        let mut routes = self.routes.lock().await;
        routes.insert((method, path.to_string()), VecDeque::from([Ok(body)]));
    }

    pub async fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    async fn push(&self, method: Method, path: &str, response: Result<Value, RemoteError>) {
        self.routes
            .lock()
            .await
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, RemoteError> {
        let route = (request.method, request.path.clone());
        self.requests.lock().await.push(request);

        let mut routes = self.routes.lock().await;
        let Some(queue) = routes.get_mut(&route) else {
            return Err(RemoteError::SubmissionFailed {
                method: route.0.to_string(),
                path: route.1,
                status: 404,
                message: "not scripted".to_string(),
            });
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(Ok(Value::Null))
        } else {
            queue.front().cloned().unwrap_or(Ok(Value::Null))
        }
    }

    async fn download(&self, path: &str) -> Result<String, RemoteError> {
        let body = self.send(ApiRequest::get(path)).await?;
        Ok(body.as_str().unwrap_or_default().to_string())
    }
}
