//! Transport abstraction for the tracker's REST API.
//!
//! This module defines the `Tracker` trait that abstracts the HTTP surface,
//! allowing the real client (`HttpTracker`) and the scripted in-memory
//! double (`ScriptedTracker`) to be used interchangeably by the pipeline.
//!
//! Non-2xx responses are converted into a structured [`Rejection`] exactly
//! once, here at the boundary — retry decisions downstream key off the
//! extracted field list, never off re-parsing error strings.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub mod http;
pub mod scripted;

pub use http::HttpTracker;
pub use scripted::{RecordedCall, ScriptedTracker};

/// Errors raised by the transport layer itself, as opposed to structured
/// rejections returned by the remote service.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Body(#[from] serde_json::Error),

    /// Connection-level failure reported without an underlying reqwest
    /// error (used by non-HTTP backends).
    #[error("connection failed: {0}")]
    Connection(String),
}

/// A raw response from the remote service: status code plus parsed body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Convert a non-2xx response into a structured rejection.
    ///
    /// A 400 body is expected to carry `errorMessages` (free-text list) and
    /// `errors` (field name → message map) in the tracker's REST dialect;
    /// both are extracted here so later retry logic never re-parses text.
    pub fn rejection(&self, endpoint: &str) -> Rejection {
        let messages = self
            .body
            .get("errorMessages")
            .and_then(Value::as_array)
            .map(|msgs| {
                msgs.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let field_errors = self
            .body
            .get("errors")
            .and_then(Value::as_object)
            .map(|errs| {
                errs.iter()
                    .map(|(field, msg)| {
                        let msg = msg.as_str().unwrap_or_default().to_string();
                        (field.clone(), msg)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Rejection {
            status: self.status,
            endpoint: endpoint.to_string(),
            messages,
            field_errors,
        }
    }
}

/// A structured rejection extracted from a non-2xx response.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// HTTP status code of the rejected request.
    pub status: u16,
    /// Endpoint the request was sent to, echoed back for diagnostics.
    pub endpoint: String,
    /// Free-text error messages (`errorMessages`).
    pub messages: Vec<String>,
    /// Field-level errors (`errors`): field name → message.
    pub field_errors: BTreeMap<String, String>,
}

impl Rejection {
    /// True when the rejection names specific invalid fields, which makes
    /// it a candidate for the clean-and-retry path.
    pub fn names_fields(&self) -> bool {
        !self.field_errors.is_empty()
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {} on '{}'", self.status, self.endpoint)?;
        if !self.messages.is_empty() {
            write!(f, ": {}", self.messages.join("; "))?;
        }
        if !self.field_errors.is_empty() {
            let fields: Vec<String> = self
                .field_errors
                .iter()
                .map(|(field, msg)| format!("{}: {}", field, msg))
                .collect();
            write!(f, " [{}]", fields.join(", "))?;
        }
        Ok(())
    }
}

/// The transport seam between the pipeline and the remote tracker.
///
/// Endpoints are given relative to the REST API root (e.g. `issue`,
/// `project/KEY/components`). Implementations must not interpret the
/// response beyond producing an [`ApiResponse`]; classification of
/// rejections belongs to the caller via [`ApiResponse::rejection`].
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Issue a request and return the raw status and parsed JSON body.
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        query: &[(String, String)],
    ) -> Result<ApiResponse, TransportError>;

    /// GET without query parameters.
    async fn get(&self, endpoint: &str) -> Result<ApiResponse, TransportError> {
        self.request(Method::GET, endpoint, None, &[]).await
    }

    /// GET with query parameters.
    async fn get_with(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<ApiResponse, TransportError> {
        self.request(Method::GET, endpoint, None, query).await
    }

    /// POST a JSON body.
    async fn post(&self, endpoint: &str, body: Value) -> Result<ApiResponse, TransportError> {
        self.request(Method::POST, endpoint, Some(body), &[]).await
    }
}
