//! State tree, segment registry and dispatcher.
//!
//! # Architecture
//!
//! ```text
//! Action ──→ Dispatcher ──→ Reducers ──→ StateTree ──→ Getters ──→ View
//!    ↑                                                              │
//!    └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Segment**: named slice of immutable state plus its handlers
//! - **Action**: tagged message describing an intended change
//! - **Reducer**: pure function `(state, action) -> state`
//! - **StateTree**: the single composed snapshot, replaced on every change

mod action;
mod error;
mod guard;
mod reducer;
mod segment;
mod tree;

pub use action::Action;
pub use error::{Activity, StoreError};
pub use reducer::{retain_if_equal, Reducer};
pub use segment::{SegmentDef, SegmentState};
pub use tree::StateTree;

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::getter::{Getter, Notification, SubscriptionId, Watch, Watcher};

use guard::ReentrancyGuard;
use segment::{same_ref, ErasedSegment};

/// The explicit state context shared by every page.
///
/// Cheap to clone; all clones refer to the same tree. Construct one per
/// process (or per test) and pass it to whatever needs it.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    current: RwLock<Arc<StateTree>>,
    /// Registered segments in slot order. Held for the whole of a dispatch,
    /// which serializes dispatches across threads.
    registry: Mutex<Vec<ErasedSegment>>,
    subscriptions: Mutex<Vec<(SubscriptionId, Arc<dyn Watch>)>>,
    next_subscription: AtomicU64,
    guard: ReentrancyGuard,
}

impl Default for StoreInner {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(StateTree::empty())),
            registry: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            guard: ReentrancyGuard::default(),
        }
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a segment to the tree under its name.
    ///
    /// # Errors
    /// `DuplicateSegment` if the name is taken; `ReentrantDispatch` when
    /// called from inside a reducer or getter of this store.
    pub fn register<S: SegmentState>(&self, definition: SegmentDef<S>) -> Result<(), StoreError> {
        if let Some(during) = self.inner.guard.current() {
            return Err(StoreError::ReentrantDispatch {
                action: "register",
                during,
            });
        }

        let mut registry = self.inner.registry.lock();
        let current = self.current_state();
        if current.contains(definition.name()) {
            return Err(StoreError::DuplicateSegment {
                name: definition.name().to_string(),
            });
        }

        let segment = definition.into_erased();
        let next = current.with_segment(Arc::clone(&segment.name), Arc::clone(&segment.initial));
        tracing::info!(segment = %segment.name, slot = registry.len(), "Segment registered");
        registry.push(segment);
        *self.inner.current.write() = Arc::new(next);
        Ok(())
    }

    /// The latest published snapshot.
    pub fn current_state(&self) -> Arc<StateTree> {
        self.inner.current.read().clone()
    }

    /// Typed read of one segment from the latest snapshot.
    pub fn get<S: SegmentState>(&self, name: &str) -> Result<Arc<S>, StoreError> {
        self.current_state().get::<S>(name)
    }

    /// Apply an action to every segment that handles its type.
    ///
    /// All resulting segment changes are committed as one snapshot swap.
    /// Returns `true` when a new snapshot was published; `false` when every
    /// handler returned its input reference, in which case nobody is
    /// notified.
    ///
    /// A panicking reducer aborts the dispatch with nothing committed.
    ///
    /// # Errors
    /// `ReentrantDispatch` when called from inside a reducer or a getter's
    /// compute function of this store.
    pub fn dispatch<A: Action>(&self, action: A) -> Result<bool, StoreError> {
        let tag = action.tag();
        if let Some(during) = self.inner.guard.current() {
            tracing::error!(action = tag, during = %during, "Reentrant dispatch rejected");
            return Err(StoreError::ReentrantDispatch { action: tag, during });
        }

        let registry = self.inner.registry.lock();
        let tree = {
            let _busy = self.inner.guard.enter(Activity::Reducing { action: tag });
            let current = self.current_state();
            let payload: &dyn Any = &action;
            let mut updates = Vec::new();
            for (slot, segment) in registry.iter().enumerate() {
                let Some(state) = current.state_at(slot) else {
                    continue;
                };
                if let Some(next) = segment.apply(TypeId::of::<A>(), state, payload) {
                    if !same_ref(state, &next) {
                        updates.push((slot, next));
                    }
                }
            }

            if updates.is_empty() {
                tracing::trace!(action = tag, "Dispatch left state unchanged");
                return Ok(false);
            }

            tracing::debug!(
                action = tag,
                changed = ?updates
                    .iter()
                    .filter_map(|(slot, _)| registry.get(*slot).map(|s| s.name.as_ref()))
                    .collect::<Vec<_>>(),
                "Dispatch committed"
            );
            let next = Arc::new(current.with_updates(updates));
            *self.inner.current.write() = Arc::clone(&next);
            next
        };

        let notifications = self.refresh_subscriptions(&tree);
        drop(registry);

        for notify in notifications {
            notify();
        }
        Ok(true)
    }

    /// Evaluate a getter against the latest snapshot.
    ///
    /// Returns the cached `Arc` when none of the getter's dependency
    /// references changed since its last evaluation.
    pub fn evaluate<T>(&self, getter: &Getter<T>) -> Result<Arc<T>, StoreError>
    where
        T: Send + Sync + 'static,
    {
        let tree = self.current_state();
        let _busy = self.inner.guard.enter(Activity::Deriving {
            getter: getter.name().to_string(),
        });
        getter.evaluate_on(&tree)
    }

    /// Call `callback` with the getter's new value after every committed
    /// dispatch that changes the value's reference.
    ///
    /// The getter is evaluated once up front to establish the baseline; the
    /// callback is not invoked for it. Callbacks run after the dispatch has
    /// finished and may dispatch themselves.
    pub fn subscribe<T, F>(&self, getter: &Getter<T>, callback: F) -> Result<SubscriptionId, StoreError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        let baseline = self.evaluate(getter)?;
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        let watcher: Arc<dyn Watch> = Arc::new(Watcher::new(getter.clone(), baseline, callback));
        self.inner.subscriptions.lock().push((id, watcher));
        tracing::debug!(subscription = id.0, getter = getter.name(), "Subscribed");
        Ok(id)
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.inner.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|(existing, _)| *existing != id);
        subscriptions.len() != before
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }

    /// Re-evaluate every subscribed getter and collect the callbacks due.
    fn refresh_subscriptions(&self, tree: &StateTree) -> Vec<Notification> {
        let watchers: Vec<(SubscriptionId, Arc<dyn Watch>)> =
            self.inner.subscriptions.lock().clone();

        let mut due = Vec::new();
        for (id, watcher) in watchers {
            let _busy = self.inner.guard.enter(Activity::Deriving {
                getter: watcher.name().to_string(),
            });
            match watcher.refresh(tree) {
                Ok(Some(notify)) => due.push(notify),
                Ok(None) => {}
                Err(error) => {
                    tracing::error!(
                        subscription = id.0,
                        getter = watcher.name(),
                        %error,
                        "Subscription evaluation failed"
                    );
                }
            }
        }
        due
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("tree", &self.current_state())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}
