//! State for the async attempt tracker.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

/// Lifecycle status of one tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttemptStatus {
    /// Never started, or cleared since.
    #[default]
    NotStarted,

    /// A request for the operation is in flight.
    InProgress,

    /// The last run completed.
    Succeeded,

    /// The last run failed; the attempt carries a message.
    Failed,
}

impl AttemptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Check if the last run finished, one way or the other.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lifecycle record of one operation id.
///
/// The record does not carry its operation id: every id that is not
/// started shares one record, so reads of unknown ids stay
/// reference-stable. Code that hands records around should keep the id
/// next to them, e.g. via [`AttemptTable::iter`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AsyncAttempt {
    pub status: AttemptStatus,
    /// Human-readable failure message, set only when `Failed`.
    pub message: Option<String>,
    /// Combined result, set only when `Succeeded`.
    pub payload: Option<Value>,
}

impl AsyncAttempt {
    pub fn in_progress() -> Self {
        Self {
            status: AttemptStatus::InProgress,
            ..Self::default()
        }
    }

    pub fn succeeded(payload: Value) -> Self {
        Self {
            status: AttemptStatus::Succeeded,
            message: None,
            payload: Some(payload),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: AttemptStatus::Failed,
            message: Some(message.into()),
            payload: None,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }
}

/// Every tracked attempt, keyed by operation id.
///
/// Ids that were never started resolve to one shared `NotStarted` record, so
/// reading an unknown id twice yields the same reference.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptTable {
    attempts: BTreeMap<String, Arc<AsyncAttempt>>,
    idle: Arc<AsyncAttempt>,
}

impl Default for AttemptTable {
    fn default() -> Self {
        Self {
            attempts: BTreeMap::new(),
            idle: Arc::new(AsyncAttempt::default()),
        }
    }
}

impl AttemptTable {
    /// The attempt for `operation_id`, `NotStarted` when unknown.
    pub fn attempt(&self, operation_id: &str) -> Arc<AsyncAttempt> {
        self.attempts
            .get(operation_id)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&self.idle))
    }

    pub fn status(&self, operation_id: &str) -> AttemptStatus {
        self.attempts
            .get(operation_id)
            .map_or(AttemptStatus::NotStarted, |attempt| attempt.status)
    }

    /// Operation ids that have ever been started.
    pub fn operation_ids(&self) -> impl Iterator<Item = &str> {
        self.attempts.keys().map(String::as_str)
    }

    /// Every started operation id with its record, in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<AsyncAttempt>)> {
        self.attempts
            .iter()
            .map(|(operation_id, attempt)| (operation_id.as_str(), attempt))
    }

    /// Number of attempts currently in flight.
    pub fn in_flight(&self) -> usize {
        self.attempts
            .values()
            .filter(|attempt| attempt.is_in_progress())
            .count()
    }

    /// A table with `operation_id` set to `next`, or `None` when the current
    /// record already equals it.
    pub(crate) fn with_attempt(&self, operation_id: &str, next: AsyncAttempt) -> Option<Self> {
        let current = self.attempt(operation_id);
        if *current == next {
            return None;
        }

        let record = if next == *self.idle {
            Arc::clone(&self.idle)
        } else {
            Arc::new(next)
        };
        let mut attempts = self.attempts.clone();
        attempts.insert(operation_id.to_string(), record);
        Some(Self {
            attempts,
            idle: Arc::clone(&self.idle),
        })
    }
}
