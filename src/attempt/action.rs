//! Actions for the async attempt tracker.

use serde_json::Value;

use crate::store::Action;

/// Lifecycle transitions of one operation id.
#[derive(Debug, Clone)]
pub enum AttemptAction {
    /// A run began. Re-arms an attempt already in progress.
    Start { operation_id: String },

    /// The run completed with a combined payload.
    Success { operation_id: String, payload: Value },

    /// The run failed with a display message.
    Fail { operation_id: String, message: String },

    /// Reset to `NotStarted`.
    Clear { operation_id: String },
}

impl AttemptAction {
    pub fn operation_id(&self) -> &str {
        match self {
            Self::Start { operation_id }
            | Self::Success { operation_id, .. }
            | Self::Fail { operation_id, .. }
            | Self::Clear { operation_id } => operation_id,
        }
    }
}

impl Action for AttemptAction {
    fn tag(&self) -> &'static str {
        match self {
            Self::Start { .. } => "attempt/start",
            Self::Success { .. } => "attempt/success",
            Self::Fail { .. } => "attempt/fail",
            Self::Clear { .. } => "attempt/clear",
        }
    }
}
