//! HTTP transport over the tracker's REST API v3.
//!
//! Authentication uses basic auth with the account email and an API token,
//! sent on every request. The body of every response is parsed as JSON when
//! present; an empty body (e.g. 204) becomes `Value::Null`.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;

use crate::config::JiraConfig;
use crate::transport::{ApiResponse, Tracker, TransportError};

/// Real HTTP client for the remote tracker.
#[derive(Debug, Clone)]
pub struct HttpTracker {
    base_url: String,
    email: String,
    api_token: String,
    client: Client,
}

impl HttpTracker {
    /// Create a client from resolved connection settings.
    pub fn new(config: &JiraConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            api_token: config.api_token.clone(),
            client: Client::new(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/rest/api/3/{}",
            self.base_url,
            endpoint.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Tracker for HttpTracker {
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        query: &[(String, String)],
    ) -> Result<ApiResponse, TransportError> {
        let url = self.url(endpoint);
        tracing::debug!(%method, %url, "sending request");

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.email, Some(&self.api_token))
            .header("Accept", "application/json");

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };

        tracing::debug!(status, "received response");
        Ok(ApiResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(base_url: &str) -> HttpTracker {
        HttpTracker::new(&JiraConfig {
            base_url: base_url.to_string(),
            email: "dev@example.com".to_string(),
            api_token: "token".to_string(),
            project_key: None,
        })
    }

    #[test]
    fn test_url_joins_endpoint() {
        let tracker = tracker("https://example.atlassian.net");
        assert_eq!(
            tracker.url("issue"),
            "https://example.atlassian.net/rest/api/3/issue"
        );
    }

    #[test]
    fn test_url_normalizes_slashes() {
        let tracker = tracker("https://example.atlassian.net/");
        assert_eq!(
            tracker.url("/project/RS/components"),
            "https://example.atlassian.net/rest/api/3/project/RS/components"
        );
    }
}
