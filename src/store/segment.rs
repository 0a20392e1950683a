//! Segment definitions: a named slice of state plus its action handlers.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use super::action::Action;
use super::reducer::Reducer;

/// Marker trait for segment state.
///
/// Segment states are immutable once published. A change is expressed by
/// returning a new `Arc` from a reducer; an unchanged state keeps its `Arc`.
pub trait SegmentState: Any + Send + Sync {}

impl<T: Any + Send + Sync> SegmentState for T {}

/// Type-erased segment state as stored in the tree.
pub(crate) type ErasedState = Arc<dyn Any + Send + Sync>;

type TypedHandler<S> = Box<dyn Fn(&Arc<S>, &dyn Any) -> Arc<S> + Send + Sync>;
type ErasedHandler = Box<dyn Fn(&ErasedState, &dyn Any) -> ErasedState + Send + Sync>;

/// Compares two erased states by allocation, ignoring vtables.
pub(crate) fn same_ref(a: &ErasedState, b: &ErasedState) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Definition of one segment: its unique name, initial state and handlers.
///
/// ```ignore
/// let counter = SegmentDef::new("counter", 0_i64)
///     .on(|count: &Arc<i64>, action: &CounterAction| match action {
///         CounterAction::Incr => Arc::new(**count + 1),
///     });
/// store.register(counter)?;
/// ```
pub struct SegmentDef<S> {
    name: String,
    initial: Arc<S>,
    handlers: HashMap<TypeId, TypedHandler<S>>,
}

impl<S: SegmentState> SegmentDef<S> {
    pub fn new(name: impl Into<String>, initial: S) -> Self {
        Self {
            name: name.into(),
            initial: Arc::new(initial),
            handlers: HashMap::new(),
        }
    }

    /// Declare a handler for every action of type `A`.
    ///
    /// A later handler for the same action type replaces the earlier one.
    pub fn on<A, F>(mut self, reducer: F) -> Self
    where
        A: Action,
        F: Fn(&Arc<S>, &A) -> Arc<S> + Send + Sync + 'static,
    {
        let handler: TypedHandler<S> =
            Box::new(move |state, action| match action.downcast_ref::<A>() {
                Some(action) => reducer(state, action),
                None => Arc::clone(state),
            });
        if self.handlers.insert(TypeId::of::<A>(), handler).is_some() {
            tracing::warn!(
                segment = %self.name,
                action = std::any::type_name::<A>(),
                "Handler replaced"
            );
        }
        self
    }

    /// Declare a handler backed by a [`Reducer`] implementation.
    pub fn reducer<R>(self) -> Self
    where
        R: Reducer<State = S> + 'static,
    {
        self.on::<R::Action, _>(R::reduce)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_state(&self) -> &Arc<S> {
        &self.initial
    }

    /// Whether this segment declares a handler for action type `A`.
    pub fn handles<A: Action>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<A>())
    }

    pub(crate) fn into_erased(self) -> ErasedSegment {
        let handlers = self
            .handlers
            .into_iter()
            .map(|(action_type, handler)| {
                let erased: ErasedHandler = Box::new(move |state, action| {
                    match Arc::clone(state).downcast::<S>() {
                        Ok(typed) => {
                            let next: ErasedState = handler(&typed, action);
                            next
                        }
                        Err(original) => original,
                    }
                });
                (action_type, erased)
            })
            .collect();

        let initial: ErasedState = self.initial;
        ErasedSegment {
            name: Arc::from(self.name),
            initial,
            handlers,
        }
    }
}

/// A registered segment with its state type erased.
pub(crate) struct ErasedSegment {
    pub(crate) name: Arc<str>,
    pub(crate) initial: ErasedState,
    handlers: HashMap<TypeId, ErasedHandler>,
}

impl ErasedSegment {
    /// Runs the handler for `action_type`, or returns `None` when the segment
    /// does not handle it.
    pub(crate) fn apply(
        &self,
        action_type: TypeId,
        state: &ErasedState,
        action: &dyn Any,
    ) -> Option<ErasedState> {
        self.handlers
            .get(&action_type)
            .map(|handler| handler(state, action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum Bump {
        By(i64),
        Nothing,
    }

    impl Action for Bump {}

    #[derive(Debug)]
    struct Unrelated;

    impl Action for Unrelated {}

    fn bump_segment() -> SegmentDef<i64> {
        SegmentDef::new("value", 10_i64).on(|value: &Arc<i64>, action: &Bump| match action {
            Bump::By(step) => Arc::new(**value + step),
            Bump::Nothing => Arc::clone(value),
        })
    }

    #[test]
    fn handles_reports_declared_types() {
        let segment = bump_segment();
        assert!(segment.handles::<Bump>());
        assert!(!segment.handles::<Unrelated>());
        assert_eq!(segment.name(), "value");
        assert_eq!(**segment.initial_state(), 10);
    }

    #[test]
    fn erased_apply_runs_matching_handler() {
        let erased = bump_segment().into_erased();
        let state = Arc::clone(&erased.initial);
        let next = erased
            .apply(TypeId::of::<Bump>(), &state, &Bump::By(5))
            .expect("handler registered");
        assert_eq!(next.downcast_ref::<i64>(), Some(&15));
        assert!(!same_ref(&state, &next));
    }

    #[test]
    fn erased_apply_keeps_reference_on_noop() {
        let erased = bump_segment().into_erased();
        let state = Arc::clone(&erased.initial);
        let next = erased
            .apply(TypeId::of::<Bump>(), &state, &Bump::Nothing)
            .expect("handler registered");
        assert!(same_ref(&state, &next));
    }

    #[test]
    fn erased_apply_without_handler_is_none() {
        let erased = bump_segment().into_erased();
        let state = Arc::clone(&erased.initial);
        assert!(erased
            .apply(TypeId::of::<Unrelated>(), &state, &Unrelated)
            .is_none());
    }
}
