//! Scripted in-memory transport for testing.
//!
//! Replays pre-registered responses per (method, endpoint) route and records
//! every call, so tests can assert call counts and ordering without a
//! network. Routes pop queued responses in order; the last response of a
//! route is sticky and keeps being returned, which makes single-response
//! routes behave like a stable remote.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::transport::{ApiResponse, Tracker, TransportError};

/// One request observed by the scripted transport.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub endpoint: String,
    pub body: Option<Value>,
}

struct Route {
    method: String,
    endpoint: String,
    responses: VecDeque<Scripted>,
}

#[derive(Clone)]
enum Scripted {
    Response(ApiResponse),
    /// Simulated connection-level failure (no HTTP response at all).
    ConnectionFailure(String),
}

/// In-memory transport double.
///
/// Clones share the same scripts and call log.
#[derive(Clone, Default)]
pub struct ScriptedTracker {
    routes: Arc<Mutex<Vec<Route>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for a route. Multiple calls for the same route
    /// queue responses in order; the final one is sticky.
    pub fn respond(&self, method: Method, endpoint: &str, status: u16, body: Value) {
        self.push(method, endpoint, Scripted::Response(ApiResponse::new(status, body)));
    }

    /// Register a connection-level failure for a route: the request errors
    /// out before any HTTP response exists.
    pub fn fail(&self, method: Method, endpoint: &str, message: &str) {
        self.push(
            method,
            endpoint,
            Scripted::ConnectionFailure(message.to_string()),
        );
    }

    fn push(&self, method: Method, endpoint: &str, scripted: Scripted) {
        let mut routes = self.routes.lock().unwrap();
        let endpoint = endpoint.trim_matches('/').to_string();
        let method = method.to_string();

        if let Some(route) = routes
            .iter_mut()
            .find(|r| r.method == method && r.endpoint == endpoint)
        {
            route.responses.push_back(scripted);
        } else {
            let mut responses = VecDeque::new();
            responses.push_back(scripted);
            routes.push(Route {
                method,
                endpoint,
                responses,
            });
        }
    }

    /// All calls observed so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls matching a method and endpoint.
    pub fn call_count(&self, method: Method, endpoint: &str) -> usize {
        let method = method.to_string();
        let endpoint = endpoint.trim_matches('/');
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.endpoint == endpoint)
            .count()
    }
}

#[async_trait]
impl Tracker for ScriptedTracker {
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        _query: &[(String, String)],
    ) -> Result<ApiResponse, TransportError> {
        let endpoint = endpoint.trim_matches('/').to_string();

        self.calls.lock().unwrap().push(RecordedCall {
            method: method.to_string(),
            endpoint: endpoint.clone(),
            body,
        });

        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|r| r.method == method.to_string() && r.endpoint == endpoint);

        match route {
            Some(route) => {
                let scripted = if route.responses.len() > 1 {
                    route.responses.pop_front().unwrap()
                } else {
                    route.responses.front().cloned().unwrap()
                };
                match scripted {
                    Scripted::Response(response) => Ok(response),
                    Scripted::ConnectionFailure(message) => {
                        Err(TransportError::Connection(message))
                    }
                }
            }
            None => Ok(ApiResponse::new(
                404,
                json!({ "errorMessages": [format!("no scripted response for {} {}", method, endpoint)] }),
            )),
        }
    }
}
