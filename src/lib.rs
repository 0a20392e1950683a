//! Reactive state core of the cluster console.
//!
//! - [`store`]: state tree, segment registry and the reentrancy-guarded
//!   dispatcher
//! - [`getter`]: memoized derivations and subscriptions
//! - [`attempt`]: lifecycle tracking of asynchronous server calls
//! - [`orchestrator`]: runs request workflows and drives the tracker
//! - [`client`]: the request collaborator and its HTTP implementation

pub mod attempt;
pub mod client;
pub mod collection;
pub mod config;
pub mod getter;
pub mod orchestrator;
pub mod store;
pub mod telemetry;

pub use attempt::{AsyncAttempt, AttemptStatus, AttemptTracker};
pub use client::{HttpClient, Request, RequestClient, RequestError};
pub use collection::{Collection, Record};
pub use getter::{Dep, Getter, SubscriptionId};
pub use orchestrator::{AsyncOperationError, CancelHandle, Orchestrator};
pub use store::{Action, SegmentDef, StateTree, Store, StoreError};
