//! The request collaborator: how orchestrated operations reach the server.
//!
//! The state core never speaks HTTP itself. Operations are described as
//! [`Request`]s and sent through a [`RequestClient`]; the production
//! implementation is [`HttpClient`], tests script their own.

mod http;

pub use http::HttpClient;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors a request collaborator can report.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestError {
    /// The server could not be reached
    #[error("Connection failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status
    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not valid JSON
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// No response within the configured time
    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Issues requests against the management API.
#[async_trait]
pub trait RequestClient: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, RequestError>;

    async fn put(&self, path: &str, body: Value) -> Result<Value, RequestError>;

    async fn post(&self, path: &str, body: Value) -> Result<Value, RequestError>;

    async fn delete(&self, path: &str) -> Result<Value, RequestError>;
}

/// HTTP verb of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

/// One call to issue through a [`RequestClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }

    /// Send this request through `client`.
    pub async fn send(self, client: &dyn RequestClient) -> Result<Value, RequestError> {
        let body = self.body.unwrap_or(Value::Null);
        match self.method {
            Method::Get => client.get(&self.path).await,
            Method::Put => client.put(&self.path, body).await,
            Method::Post => client.post(&self.path, body).await,
            Method::Delete => client.delete(&self.path).await,
        }
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path)
    }
}
