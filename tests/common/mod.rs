//! Shared test utilities and mock infrastructure.

#![allow(dead_code, unused_imports)]

pub mod mock_server;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use console_state::{RequestClient, RequestError};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

type Reply = Result<Value, RequestError>;

/// A call the scripted client has received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct Script {
    calls: Vec<RecordedCall>,
    canned: HashMap<String, Reply>,
    waiting: VecDeque<(String, oneshot::Sender<Reply>)>,
}

/// In-memory request collaborator whose responses the test releases.
///
/// Paths with a canned reply resolve at once; every other call parks until
/// [`ScriptedClient::respond`] releases it.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<Script>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer every call to `path` immediately with `reply`.
    pub fn canned(&self, path: &str, reply: Reply) {
        self.script.lock().canned.insert(path.to_string(), reply);
    }

    /// Release the oldest parked call to `path`. False if none is parked.
    pub fn respond(&self, path: &str, reply: Reply) -> bool {
        let sender = {
            let mut script = self.script.lock();
            let position = script.waiting.iter().position(|(p, _)| p == path);
            position.and_then(|index| script.waiting.remove(index))
        };
        match sender {
            Some((_, sender)) => sender.send(reply).is_ok(),
            None => false,
        }
    }

    pub fn parked(&self) -> usize {
        self.script.lock().waiting.len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().calls.clone()
    }

    /// Wait until at least `count` calls are parked.
    pub async fn wait_for_parked(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.parked() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("requests were not issued in time");
    }

    async fn call(&self, method: &'static str, path: &str, body: Option<Value>) -> Reply {
        let receiver = {
            let mut script = self.script.lock();
            script.calls.push(RecordedCall {
                method,
                path: path.to_string(),
                body,
            });
            if let Some(reply) = script.canned.get(path) {
                return reply.clone();
            }
            let (sender, receiver) = oneshot::channel();
            script.waiting.push_back((path.to_string(), sender));
            receiver
        };
        receiver
            .await
            .unwrap_or_else(|_| Err(RequestError::Transport("script dropped".to_string())))
    }
}

#[async_trait]
impl RequestClient for ScriptedClient {
    async fn get(&self, path: &str) -> Result<Value, RequestError> {
        self.call("GET", path, None).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value, RequestError> {
        self.call("PUT", path, Some(body)).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, RequestError> {
        self.call("POST", path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value, RequestError> {
        self.call("DELETE", path, None).await
    }
}

/// A `Status` error carrying a JSON body with `message`.
pub fn status_error(status: u16, message: &str) -> RequestError {
    RequestError::Status {
        status,
        body: serde_json::json!({ "message": message }).to_string(),
    }
}

/// Let spawned tasks on the current-thread runtime make progress.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
