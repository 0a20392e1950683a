//! Read and write API over the attempts segment.

use std::sync::Arc;

use serde_json::Value;

use crate::getter::{Dep, Getter};
use crate::store::{SegmentDef, Store, StoreError};

use super::action::AttemptAction;
use super::reducer::AttemptReducer;
use super::state::{AsyncAttempt, AttemptStatus, AttemptTable};

/// Name of the segment holding every attempt.
pub const ATTEMPTS_SEGMENT: &str = "async_attempts";

/// Definition of the attempts segment.
pub fn segment() -> SegmentDef<AttemptTable> {
    SegmentDef::new(ATTEMPTS_SEGMENT, AttemptTable::default()).reducer::<AttemptReducer>()
}

/// Handle for starting, settling and reading attempts on one store.
#[derive(Debug, Clone)]
pub struct AttemptTracker {
    store: Store,
}

impl AttemptTracker {
    /// Register the attempts segment on `store`.
    pub fn install(store: &Store) -> Result<Self, StoreError> {
        store.register(segment())?;
        Ok(Self {
            store: store.clone(),
        })
    }

    /// Use an attempts segment already registered on `store`.
    pub fn attach(store: &Store) -> Result<Self, StoreError> {
        store.get::<AttemptTable>(ATTEMPTS_SEGMENT)?;
        Ok(Self {
            store: store.clone(),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn start(&self, operation_id: &str) -> Result<bool, StoreError> {
        self.store.dispatch(AttemptAction::Start {
            operation_id: operation_id.to_string(),
        })
    }

    pub fn success(&self, operation_id: &str, payload: Value) -> Result<bool, StoreError> {
        self.store.dispatch(AttemptAction::Success {
            operation_id: operation_id.to_string(),
            payload,
        })
    }

    pub fn fail(&self, operation_id: &str, message: impl Into<String>) -> Result<bool, StoreError> {
        self.store.dispatch(AttemptAction::Fail {
            operation_id: operation_id.to_string(),
            message: message.into(),
        })
    }

    pub fn clear(&self, operation_id: &str) -> Result<bool, StoreError> {
        self.store.dispatch(AttemptAction::Clear {
            operation_id: operation_id.to_string(),
        })
    }

    /// All attempts in the latest snapshot.
    ///
    /// # Errors
    /// `UnknownSegment` or `SegmentTypeMismatch` when the store no longer
    /// holds the attempts segment this tracker was built for.
    pub fn table(&self) -> Result<Arc<AttemptTable>, StoreError> {
        self.store.get::<AttemptTable>(ATTEMPTS_SEGMENT)
    }

    pub fn attempt(&self, operation_id: &str) -> Result<Arc<AsyncAttempt>, StoreError> {
        Ok(self.table()?.attempt(operation_id))
    }

    pub fn status(&self, operation_id: &str) -> Result<AttemptStatus, StoreError> {
        Ok(self.table()?.status(operation_id))
    }

    pub fn message(&self, operation_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.attempt(operation_id)?.message.clone())
    }

    pub fn payload(&self, operation_id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.attempt(operation_id)?.payload.clone())
    }

    /// A getter over one operation's attempt, for subscriptions.
    ///
    /// Its value keeps its reference until that operation's record changes.
    pub fn getter(&self, operation_id: &str) -> Getter<AsyncAttempt> {
        attempt_getter(operation_id)
    }
}

/// A getter over one operation's attempt.
pub fn attempt_getter(operation_id: &str) -> Getter<AsyncAttempt> {
    let id = operation_id.to_string();
    Getter::from_dep(Dep::path(
        ATTEMPTS_SEGMENT,
        operation_id,
        move |table: &AttemptTable| Some(table.attempt(&id)),
    ))
}
