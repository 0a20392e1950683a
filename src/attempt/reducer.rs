//! Reducer for the async attempt tracker.

use std::sync::Arc;

use crate::store::Reducer;

use super::action::AttemptAction;
use super::state::{AsyncAttempt, AttemptTable};

/// Reducer for attempt lifecycle transitions.
///
/// `Success` and `Fail` apply from any status, so two runs sharing one
/// operation id race and the last one to settle wins.
pub struct AttemptReducer;

impl Reducer for AttemptReducer {
    type State = AttemptTable;
    type Action = AttemptAction;

    fn reduce(state: &Arc<Self::State>, action: &Self::Action) -> Arc<Self::State> {
        let next = match action {
            AttemptAction::Start { .. } => AsyncAttempt::in_progress(),
            AttemptAction::Success { payload, .. } => AsyncAttempt::succeeded(payload.clone()),
            AttemptAction::Fail { message, .. } => AsyncAttempt::failed(message.clone()),
            AttemptAction::Clear { .. } => AsyncAttempt::default(),
        };

        match state.with_attempt(action.operation_id(), next) {
            Some(table) => Arc::new(table),
            None => Arc::clone(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::AttemptStatus;
    use serde_json::json;

    fn reduce(state: &Arc<AttemptTable>, action: AttemptAction) -> Arc<AttemptTable> {
        AttemptReducer::reduce(state, &action)
    }

    fn start(id: &str) -> AttemptAction {
        AttemptAction::Start {
            operation_id: id.into(),
        }
    }

    #[test]
    fn start_then_success() {
        let state = Arc::new(AttemptTable::default());
        let state = reduce(&state, start("load-nodes"));
        assert_eq!(state.status("load-nodes"), AttemptStatus::InProgress);

        let state = reduce(
            &state,
            AttemptAction::Success {
                operation_id: "load-nodes".into(),
                payload: json!([1, 2]),
            },
        );
        let attempt = state.attempt("load-nodes");
        assert_eq!(attempt.status, AttemptStatus::Succeeded);
        assert_eq!(attempt.payload, Some(json!([1, 2])));
    }

    #[test]
    fn start_clears_previous_failure() {
        let state = Arc::new(AttemptTable::default());
        let state = reduce(&state, start("save-role"));
        let state = reduce(
            &state,
            AttemptAction::Fail {
                operation_id: "save-role".into(),
                message: "Role exists".into(),
            },
        );
        assert_eq!(
            state.attempt("save-role").message.as_deref(),
            Some("Role exists")
        );

        let state = reduce(&state, start("save-role"));
        let attempt = state.attempt("save-role");
        assert_eq!(attempt.status, AttemptStatus::InProgress);
        assert!(attempt.message.is_none());
    }

    #[test]
    fn restart_while_in_progress_keeps_reference() {
        let state = reduce(&Arc::new(AttemptTable::default()), start("load-nodes"));
        let again = reduce(&state, start("load-nodes"));
        assert!(Arc::ptr_eq(&state, &again));
    }

    #[test]
    fn clear_of_unknown_id_keeps_reference() {
        let state = Arc::new(AttemptTable::default());
        let next = reduce(
            &state,
            AttemptAction::Clear {
                operation_id: "never".into(),
            },
        );
        assert!(Arc::ptr_eq(&state, &next));
    }

    #[test]
    fn other_ids_keep_their_records() {
        let state = reduce(&Arc::new(AttemptTable::default()), start("a"));
        let before = state.attempt("a");
        let state = reduce(&state, start("b"));
        assert!(Arc::ptr_eq(&before, &state.attempt("a")));
    }
}
