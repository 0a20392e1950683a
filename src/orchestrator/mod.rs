//! Drives asynchronous workflows against the request collaborator and
//! records their lifecycle in the attempt tracker.
//!
//! Every operation follows the same shape:
//!
//! 1. `start(op)` is dispatched
//! 2. all requests are issued concurrently
//! 3. the first failure dispatches `fail(op, message)` right away; requests
//!    still in flight finish in the background and their results are dropped
//! 4. on all-success the results are combined and post-processed
//! 5. `success(op, combined)` is dispatched
//!
//! ```ignore
//! let nodes = orchestrator
//!     .operation("load-nodes")
//!     .get("/api/nodes")
//!     .get("/api/nodes/status")
//!     .post_process(|store, combined| store_nodes(store, combined))
//!     .run()
//!     .await?;
//! ```

mod cancel;
mod join;
mod message;

pub use cancel::CancelHandle;
pub use message::{
    extract_message, JsonMessageExtractor, MessageExtractor, CANCELLED_MESSAGE, FALLBACK_MESSAGE,
    TIMEOUT_MESSAGE, UNREACHABLE_MESSAGE,
};

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use thiserror::Error;

use crate::attempt::{AsyncAttempt, AttemptTracker};
use crate::client::{Request, RequestClient, RequestError};
use crate::store::{Store, StoreError};

use join::{all_or_first_failure, guarded, Interrupted, RequestFuture};

/// Why an orchestrated operation failed.
///
/// Displays as the message recorded on the attempt.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AsyncOperationError {
    /// A request failed
    #[error("{message}")]
    Request {
        message: String,
        #[source]
        source: RequestError,
    },

    /// Every request succeeded but post-processing rejected the result
    #[error("{message}")]
    PostProcess { message: String },

    /// The operation exceeded its time limit
    #[error("{message}")]
    TimedOut { message: String, after: Duration },

    /// The operation was cancelled through its handle
    #[error("{message}")]
    Cancelled { message: String },

    /// The attempt could not be recorded
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AsyncOperationError {
    /// The message recorded on the failed attempt.
    pub fn message(&self) -> String {
        match self {
            Self::Request { message, .. }
            | Self::PostProcess { message }
            | Self::TimedOut { message, .. }
            | Self::Cancelled { message } => message.clone(),
            Self::Store(error) => error.to_string(),
        }
    }
}

/// Default combine step: one result as-is, several as an array in request
/// order, none as `null`.
pub fn combine_results(mut values: Vec<Value>) -> Value {
    match values.len() {
        0 => Value::Null,
        1 => values.pop().unwrap_or_default(),
        _ => Value::Array(values),
    }
}

/// Starts operations against one store and one request collaborator.
#[derive(Clone)]
pub struct Orchestrator {
    tracker: AttemptTracker,
    client: Arc<dyn RequestClient>,
    extractor: Arc<dyn MessageExtractor>,
    timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(tracker: AttemptTracker, client: Arc<dyn RequestClient>) -> Self {
        Self {
            tracker,
            client,
            extractor: Arc::new(JsonMessageExtractor),
            timeout: None,
        }
    }

    /// Replace the error message extractor.
    pub fn with_extractor(mut self, extractor: impl MessageExtractor + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Time limit applied to operations that do not set their own.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn tracker(&self) -> &AttemptTracker {
        &self.tracker
    }

    pub fn store(&self) -> &Store {
        self.tracker.store()
    }

    /// Begin describing an operation tracked under `operation_id`.
    pub fn operation(&self, operation_id: impl Into<String>) -> Operation {
        Operation {
            orchestrator: self.clone(),
            operation_id: operation_id.into(),
            requests: Vec::new(),
            combine: None,
            post_process: None,
            always: None,
            timeout: None,
            cancel: None,
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("tracker", &self.tracker)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

type Combine = Box<dyn FnOnce(Vec<Value>) -> Value + Send>;
type PostProcess = Box<dyn FnOnce(&Store, &Value) -> anyhow::Result<()> + Send>;
type Always = Box<dyn FnOnce(&AsyncAttempt) + Send>;

/// One orchestrated workflow, built up and then [`run`](Operation::run).
#[must_use = "an operation does nothing until `run` is awaited"]
pub struct Operation {
    orchestrator: Orchestrator,
    operation_id: String,
    requests: Vec<Request>,
    combine: Option<Combine>,
    post_process: Option<PostProcess>,
    always: Option<Always>,
    timeout: Option<Duration>,
    cancel: Option<CancelHandle>,
}

impl Operation {
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn request(mut self, request: Request) -> Self {
        self.requests.push(request);
        self
    }

    pub fn requests(mut self, requests: impl IntoIterator<Item = Request>) -> Self {
        self.requests.extend(requests);
        self
    }

    pub fn get(self, path: impl Into<String>) -> Self {
        self.request(Request::get(path))
    }

    pub fn put(self, path: impl Into<String>, body: Value) -> Self {
        self.request(Request::put(path, body))
    }

    pub fn post(self, path: impl Into<String>, body: Value) -> Self {
        self.request(Request::post(path, body))
    }

    pub fn delete(self, path: impl Into<String>) -> Self {
        self.request(Request::delete(path))
    }

    /// Replace [`combine_results`] for this operation.
    pub fn combine<F>(mut self, combine: F) -> Self
    where
        F: FnOnce(Vec<Value>) -> Value + Send + 'static,
    {
        self.combine = Some(Box::new(combine));
        self
    }

    /// Synchronous step run on all-success, before the attempt succeeds.
    ///
    /// Typically dispatches the combined result into a page's segment. An
    /// error fails the attempt with the error's message.
    pub fn post_process<F>(mut self, step: F) -> Self
    where
        F: FnOnce(&Store, &Value) -> anyhow::Result<()> + Send + 'static,
    {
        self.post_process = Some(Box::new(step));
        self
    }

    /// Called with the settled attempt, whatever the outcome.
    pub fn always<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&AsyncAttempt) + Send + 'static,
    {
        self.always = Some(Box::new(hook));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_with(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }

    /// Run the operation to settlement.
    ///
    /// The attempt is always left `Succeeded` or `Failed` unless recording
    /// the attempt itself failed.
    pub async fn run(self) -> Result<Value, AsyncOperationError> {
        let Operation {
            orchestrator,
            operation_id,
            requests,
            combine,
            post_process,
            always,
            timeout,
            cancel,
        } = self;
        let tracker = &orchestrator.tracker;

        tracker.start(&operation_id)?;
        tracing::debug!(
            operation = %operation_id,
            requests = requests.len(),
            "Operation started"
        );

        let futures: Vec<RequestFuture> = requests
            .into_iter()
            .map(|request| {
                let client = Arc::clone(&orchestrator.client);
                async move { request.send(&*client).await }.boxed()
            })
            .collect();

        let limit = timeout.or(orchestrator.timeout);
        let outcome = match guarded(all_or_first_failure(futures), limit, cancel.as_ref()).await {
            Ok(Ok(values)) => finish(tracker.store(), values, combine, post_process),
            Ok(Err(failure)) => {
                let message = extract_message(&*orchestrator.extractor, &failure.error);
                let in_flight = failure.pending.len();
                tracing::debug!(
                    operation = %operation_id,
                    request = failure.index,
                    in_flight,
                    "Request failed"
                );
                if in_flight > 0 {
                    drain_in_background(&operation_id, failure.pending);
                }
                Err(AsyncOperationError::Request {
                    message,
                    source: failure.error,
                })
            }
            Err(Interrupted::TimedOut(after)) => Err(AsyncOperationError::TimedOut {
                message: TIMEOUT_MESSAGE.to_string(),
                after,
            }),
            Err(Interrupted::Cancelled) => Err(AsyncOperationError::Cancelled {
                message: CANCELLED_MESSAGE.to_string(),
            }),
        };

        match &outcome {
            Ok(payload) => {
                tracker.success(&operation_id, payload.clone())?;
                tracing::debug!(operation = %operation_id, "Operation succeeded");
            }
            Err(error) => {
                tracing::warn!(operation = %operation_id, %error, "Operation failed");
                tracker.fail(&operation_id, error.message())?;
            }
        }

        if let Some(always) = always {
            always(&*tracker.attempt(&operation_id)?);
        }
        outcome
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("operation_id", &self.operation_id)
            .field("requests", &self.requests)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Combine and post-process the results of an all-success join.
///
/// A panic in either step fails the operation like a returned error.
fn finish(
    store: &Store,
    values: Vec<Value>,
    combine: Option<Combine>,
    post_process: Option<PostProcess>,
) -> Result<Value, AsyncOperationError> {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let combined = match combine {
            Some(combine) => combine(values),
            None => combine_results(values),
        };
        match post_process {
            Some(step) => step(store, &combined).map(|()| combined),
            None => Ok(combined),
        }
    }));

    match outcome {
        Ok(Ok(combined)) => Ok(combined),
        Ok(Err(error)) => Err(AsyncOperationError::PostProcess {
            message: error.to_string(),
        }),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(%message, "Post-processing panicked");
            Err(AsyncOperationError::PostProcess { message })
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}

fn drain_in_background(operation_id: &str, pending: join::Pending) {
    let operation_id = operation_id.to_string();
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                let discarded = pending.drain().await;
                tracing::debug!(
                    operation = %operation_id,
                    discarded,
                    "Late results discarded"
                );
            });
        }
        Err(_) => {
            tracing::warn!(
                operation = %operation_id,
                in_flight = pending.len(),
                "No runtime to finish in-flight requests; dropping them"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn combine_shapes() {
        assert_eq!(combine_results(vec![]), Value::Null);
        assert_eq!(combine_results(vec![json!({"a": 1})]), json!({"a": 1}));
        assert_eq!(
            combine_results(vec![json!(1), json!(2)]),
            json!([1, 2])
        );
    }

    #[test]
    fn panic_payloads_become_messages() {
        let text = catch_unwind(|| panic!("node list missing")).unwrap_err();
        assert_eq!(panic_message(text.as_ref()), "node list missing");

        let formatted = catch_unwind(|| panic!("{} nodes missing", 3)).unwrap_err();
        assert_eq!(panic_message(formatted.as_ref()), "3 nodes missing");

        let opaque = catch_unwind(|| std::panic::panic_any(17_u32)).unwrap_err();
        assert_eq!(panic_message(opaque.as_ref()), FALLBACK_MESSAGE);
    }

    #[test]
    fn error_message_matches_display() {
        let error = AsyncOperationError::Request {
            message: "Role already exists".into(),
            source: RequestError::Status {
                status: 409,
                body: String::new(),
            },
        };
        assert_eq!(error.message(), "Role already exists");
        assert_eq!(error.to_string(), "Role already exists");
    }
}
