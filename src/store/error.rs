//! Error types for the store, registry and getter engine.

use std::fmt;

use thiserror::Error;

/// What the store was busy with when a dispatch was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    /// Reducers were running for the named action.
    Reducing { action: &'static str },
    /// A getter's compute function was running.
    Deriving { getter: String },
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Reducing { action } => write!(f, "reducing '{}'", action),
            Activity::Deriving { getter } => write!(f, "evaluating getter '{}'", getter),
        }
    }
}

/// Errors raised by the state tree, dispatcher and getter engine.
///
/// All of these are programmer errors. They are expected to surface in
/// tests, not to be recovered from at runtime.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A segment with this name is already registered.
    #[error("Segment '{name}' is already registered")]
    DuplicateSegment { name: String },

    /// No segment with this name is registered.
    #[error("Segment '{name}' is not registered")]
    UnknownSegment { name: String },

    /// A getter dependency path could not be resolved.
    #[error("Path '{path}' not found in segment '{segment}'")]
    UnknownGetterPath { segment: String, path: String },

    /// The segment holds a different state type than requested.
    #[error("Segment '{segment}' does not hold a value of type {expected}")]
    SegmentTypeMismatch {
        segment: String,
        expected: &'static str,
    },

    /// Dispatch was called while the store was reducing or deriving.
    #[error("Dispatch of '{action}' rejected while {during}")]
    ReentrantDispatch {
        action: &'static str,
        during: Activity,
    },
}
