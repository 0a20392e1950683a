//! Subscriptions: re-evaluate a getter after each commit and notify on change.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::store::{StateTree, StoreError};

use super::Getter;

/// Handle returned by `Store::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// A pending callback invocation, run once the dispatch has finished.
pub(crate) type Notification = Box<dyn FnOnce() + Send>;

/// Type-erased view of a subscription used by the store.
pub(crate) trait Watch: Send + Sync {
    fn name(&self) -> &str;

    /// Re-evaluate against `tree`; returns the callback to run if the
    /// value's reference changed.
    ///
    /// The callback is skipped if a later dispatch has already moved the
    /// watcher past this value by the time it runs.
    fn refresh(&self, tree: &StateTree) -> Result<Option<Notification>, StoreError>;
}

type Callback<T> = Arc<dyn Fn(&Arc<T>) + Send + Sync>;

pub(crate) struct Watcher<T> {
    getter: Getter<T>,
    last: Arc<Mutex<Arc<T>>>,
    callback: Callback<T>,
}

impl<T: Send + Sync + 'static> Watcher<T> {
    pub(crate) fn new<F>(getter: Getter<T>, baseline: Arc<T>, callback: F) -> Self
    where
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        Self {
            getter,
            last: Arc::new(Mutex::new(baseline)),
            callback: Arc::new(callback),
        }
    }
}

impl<T: Send + Sync + 'static> Watch for Watcher<T> {
    fn name(&self) -> &str {
        self.getter.name()
    }

    fn refresh(&self, tree: &StateTree) -> Result<Option<Notification>, StoreError> {
        let value = self.getter.evaluate_on(tree)?;
        {
            let mut last = self.last.lock();
            if Arc::ptr_eq(&*last, &value) {
                return Ok(None);
            }
            *last = Arc::clone(&value);
        }

        let callback = Arc::clone(&self.callback);
        let last = Arc::clone(&self.last);
        Ok(Some(Box::new(move || {
            let current = Arc::ptr_eq(&*last.lock(), &value);
            if current {
                callback(&value);
            }
        })))
    }
}
