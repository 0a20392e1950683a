//! `reqwest`-backed request collaborator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::config::ServerConfig;

use super::{RequestClient, RequestError};

/// JSON-over-HTTP client rooted at the management API's base URL.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(server: &ServerConfig) -> Result<Self, RequestError> {
        let client = Client::builder()
            .connect_timeout(server.connect_timeout())
            .timeout(server.timeout())
            .build()
            .map_err(|e| RequestError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: server.base_url.trim_end_matches('/').to_string(),
            timeout: server.timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Value, RequestError> {
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Request rejected by server");
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| RequestError::Decode(e.to_string()))
    }

    fn transport_error(&self, error: reqwest::Error) -> RequestError {
        if error.is_timeout() {
            RequestError::Timeout(self.timeout)
        } else {
            RequestError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl RequestClient for HttpClient {
    async fn get(&self, path: &str) -> Result<Value, RequestError> {
        tracing::trace!(path, "GET");
        self.execute(self.client.get(self.url(path))).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value, RequestError> {
        tracing::trace!(path, "PUT");
        self.execute(self.client.put(self.url(path)).json(&body)).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, RequestError> {
        tracing::trace!(path, "POST");
        self.execute(self.client.post(self.url(path)).json(&body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value, RequestError> {
        tracing::trace!(path, "DELETE");
        self.execute(self.client.delete(self.url(path))).await
    }
}
