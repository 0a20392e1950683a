//! Reducer trait for segment state transitions.

use std::sync::Arc;

use super::action::Action;
use super::segment::SegmentState;

/// Reducer transforms a segment's state based on actions.
///
/// The reducer is the only place where state transitions happen.
/// It must be a pure function: (State, Action) -> State.
///
/// When an action leaves the semantic value unchanged the reducer must hand
/// back the very same `Arc` it was given. Change detection downstream relies
/// on pointer identity, never on deep comparison.
pub trait Reducer {
    /// The state type this reducer operates on.
    type State: SegmentState;

    /// The action type this reducer handles.
    type Action: Action;

    /// Process an action and return the next state.
    fn reduce(state: &Arc<Self::State>, action: &Self::Action) -> Arc<Self::State>;
}

/// Returns `state` itself when `next` is equal to it, otherwise a fresh `Arc`.
pub fn retain_if_equal<S: PartialEq>(state: &Arc<S>, next: S) -> Arc<S> {
    if **state == next {
        Arc::clone(state)
    } else {
        Arc::new(next)
    }
}
